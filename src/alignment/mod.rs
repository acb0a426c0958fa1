//! Face-position gate shown before the capture tasks.
//!
//! The detector itself is external; this module only turns its bounding box
//! into an aligned / not-aligned reading with diagnostics.

pub mod geometry;

use anyhow::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::frames::VideoSource;
use crate::models::Viewport;

pub use geometry::{NormalizedBox, Rect};

/// Tuning for the alignment gate. These are empirical UI values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignmentThresholds {
    /// Side of the center box as a fraction of the viewport height.
    pub center_box_ratio: f64,
    /// Largest allowed center offset as a fraction of the box side.
    pub max_offset_ratio: f64,
    /// Smallest accepted intersection-over-union with the center box.
    pub min_overlap: f64,
}

impl Default for AlignmentThresholds {
    fn default() -> Self {
        Self {
            center_box_ratio: 0.3,
            max_offset_ratio: 0.3,
            min_overlap: 0.4,
        }
    }
}

/// Finds the participant's face in a frame.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &RgbaImage) -> Result<Option<NormalizedBox>>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentReading {
    pub aligned: bool,
    pub face: Option<Rect>,
    pub center_box: Option<Rect>,
    pub offset: Option<f64>,
    pub max_offset: Option<f64>,
    pub overlap: Option<f64>,
}

impl AlignmentReading {
    pub fn not_aligned() -> Self {
        Self {
            aligned: false,
            face: None,
            center_box: None,
            offset: None,
            max_offset: None,
            overlap: None,
        }
    }
}

/// Scores a face box against the center box of the displayed video area.
pub fn evaluate(
    face: Rect,
    video_area: Rect,
    viewport: Viewport,
    thresholds: &AlignmentThresholds,
) -> AlignmentReading {
    let size = viewport.height * thresholds.center_box_ratio;
    let (cx, cy) = video_area.center();
    let center_box = Rect::centered_square(cx, cy, size);

    let offset = face.center_distance(&center_box);
    let max_offset = size * thresholds.max_offset_ratio;
    let overlap = face.iou(&center_box);

    AlignmentReading {
        aligned: offset <= max_offset && overlap >= thresholds.min_overlap,
        face: Some(face),
        center_box: Some(center_box),
        offset: Some(offset),
        max_offset: Some(max_offset),
        overlap: Some(overlap),
    }
}

pub struct AlignmentGate<D> {
    detector: D,
    thresholds: AlignmentThresholds,
}

impl<D: FaceDetector> AlignmentGate<D> {
    pub fn new(detector: D, thresholds: AlignmentThresholds) -> Self {
        Self {
            detector,
            thresholds,
        }
    }

    /// Grabs the current frame and scores it. An unready source or a frame
    /// without a face reads as not aligned.
    pub fn check(
        &mut self,
        source: &dyn VideoSource,
        viewport: Viewport,
    ) -> Result<AlignmentReading> {
        if !source.is_ready() {
            return Ok(AlignmentReading::not_aligned());
        }

        let frame = source.grab()?;
        let Some(face) = self.detector.detect(&frame)? else {
            return Ok(AlignmentReading::not_aligned());
        };

        let display = Rect::new(0.0, 0.0, viewport.width, viewport.height);
        let area = geometry::fitted_video_area(frame.dimensions(), display);
        Ok(evaluate(geometry::project(face, area), area, viewport, &self.thresholds))
    }
}
