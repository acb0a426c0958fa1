use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in display pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square of side `size` centered on `(cx, cy)`.
    pub fn centered_square(cx: f64, cy: f64, size: f64) -> Self {
        Self::new(cx - size / 2.0, cy - size / 2.0, size, size)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Intersection over union; 0 when the union is empty.
    pub fn iou(&self, other: &Rect) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Detector output: center and size as fractions of the video frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

/// Region of `display` the video actually occupies when scaled to fit while
/// keeping its aspect ratio.
pub fn fitted_video_area(video_size: (u32, u32), display: Rect) -> Rect {
    let (vw, vh) = video_size;
    if vw == 0 || vh == 0 || display.height <= 0.0 {
        return display;
    }

    let video_aspect = f64::from(vw) / f64::from(vh);
    let display_aspect = display.width / display.height;

    if display_aspect > video_aspect {
        let width = display.height * video_aspect;
        Rect::new(display.x + (display.width - width) / 2.0, display.y, width, display.height)
    } else {
        let height = display.width / video_aspect;
        Rect::new(display.x, display.y + (display.height - height) / 2.0, display.width, height)
    }
}

/// Projects a normalized detection into display space.
pub fn project(face: NormalizedBox, area: Rect) -> Rect {
    let width = face.width * area.width;
    let height = face.height * area.height;
    Rect::new(
        area.x + face.x_center * area.width - width / 2.0,
        area.y + face.y_center * area.height - height / 2.0,
        width,
        height,
    )
}
