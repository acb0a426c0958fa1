use serde::{Deserialize, Serialize};

/// Live screen size in CSS-style pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Target {
        Target::new(self.width / 2.0, self.height / 2.0)
    }
}

/// A screen coordinate the participant must look at or click.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub x: f64,
    pub y: f64,
}

impl Target {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A cell of an R×R grid, before conversion to screen space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
}

impl GridCell {
    /// Center of the cell in screen space for a grid of `size` cells per side.
    pub fn to_target(self, size: u32, viewport: Viewport) -> Target {
        let size = f64::from(size);
        Target::new(
            (f64::from(self.col) + 0.5) / size * viewport.width,
            (f64::from(self.row) + 0.5) / size * viewport.height,
        )
    }
}
