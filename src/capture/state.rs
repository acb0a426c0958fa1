use std::sync::Arc;

use serde::Serialize;

use crate::error::CaptureError;
use crate::models::{CapturedDatum, EncodedImage, Target};
use crate::sequence::TargetSequence;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Running,
    Completed,
}

/// A click frozen at dispatch time. Completion uses these values, never the
/// index as it stands when encoding finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRequest {
    pub index: usize,
    pub target: Target,
    pub timestamp_ms: i64,
    /// False for a repeated center, which advances without capturing.
    pub needs_image: bool,
}

/// Result of one successful progression step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    pub datum: Option<CapturedDatum>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickDecision {
    /// The displayed index was already handled.
    Pending { index: usize },
    /// First tick showing `index`: capture it now.
    Capture { index: usize, target: Target },
    /// First tick showing a repeated center: nothing to capture.
    SkipCenter { index: usize },
    /// Elapsed time ran past the last target.
    Completed,
    /// Ticks arriving after completion.
    Idle,
}

/// Progression through one phase's target sequence.
#[derive(Debug, Clone)]
pub struct CaptureState {
    sequence: Arc<TargetSequence>,
    current_index: usize,
    last_captured: Option<usize>,
    center_captured: bool,
    status: CaptureStatus,
}

impl CaptureState {
    pub fn new(sequence: Arc<TargetSequence>) -> Self {
        let status = if sequence.is_empty() {
            CaptureStatus::Completed
        } else {
            CaptureStatus::Running
        };
        Self {
            sequence,
            current_index: 0,
            last_captured: None,
            center_captured: false,
            status,
        }
    }

    pub fn sequence(&self) -> &TargetSequence {
        &self.sequence
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_target(&self) -> Option<Target> {
        match self.status {
            CaptureStatus::Running => self.sequence.get(self.current_index),
            CaptureStatus::Completed => None,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == CaptureStatus::Completed
    }

    pub fn center_captured(&self) -> bool {
        self.center_captured
    }

    fn is_repeated_center(&self, target: Target) -> bool {
        self.center_captured && self.sequence.is_center(target)
    }

    /// Builds the datum for `target`, consuming the one-shot center capture
    /// only when a datum actually results.
    pub fn record(
        &mut self,
        target: Target,
        images: Vec<EncodedImage>,
        timestamp_ms: i64,
    ) -> Option<CapturedDatum> {
        let datum = CapturedDatum::from_images(images, target.x, target.y, timestamp_ms)?;
        if self.sequence.is_center(target) {
            self.center_captured = true;
        }
        Some(datum)
    }

    pub fn begin_click(&self, timestamp_ms: i64) -> Result<ClickRequest, CaptureError> {
        let target = self.current_target().ok_or(CaptureError::PhaseComplete)?;
        Ok(ClickRequest {
            index: self.current_index,
            target,
            timestamp_ms,
            needs_image: !self.is_repeated_center(target),
        })
    }

    /// Applies a click whose image(s) are now available. A failed capture
    /// leaves the index untouched so the participant can retry.
    pub fn finish_click(
        &mut self,
        request: &ClickRequest,
        images: Vec<EncodedImage>,
    ) -> Result<StepOutcome, CaptureError> {
        if self.is_completed() {
            return Err(CaptureError::PhaseComplete);
        }
        if request.index != self.current_index {
            return Err(CaptureError::Stale {
                requested: request.index,
                current: self.current_index,
            });
        }

        let datum = if self.is_repeated_center(request.target) {
            None
        } else {
            let datum = self
                .record(request.target, images, request.timestamp_ms)
                .ok_or(CaptureError::Empty {
                    index: request.index,
                })?;
            Some(datum)
        };

        self.last_captured = Some(request.index);
        self.current_index += 1;
        if self.current_index >= self.sequence.len() {
            self.status = CaptureStatus::Completed;
        }

        Ok(StepOutcome {
            index: request.index,
            datum,
            completed: self.is_completed(),
        })
    }

    /// Maps elapsed display time to the target that should be on screen and
    /// decides whether it still needs its single capture.
    pub fn on_tick(&mut self, elapsed_ms: u64, display_duration_ms: u64) -> TickDecision {
        if self.is_completed() {
            return TickDecision::Idle;
        }

        let index = (elapsed_ms / display_duration_ms.max(1)) as usize;
        if index >= self.sequence.len() {
            self.current_index = self.sequence.len();
            self.status = CaptureStatus::Completed;
            return TickDecision::Completed;
        }

        self.current_index = index;
        if self.last_captured.is_some_and(|last| index <= last) {
            return TickDecision::Pending { index };
        }
        self.last_captured = Some(index);

        let target = self.sequence.targets()[index];
        if self.is_repeated_center(target) {
            TickDecision::SkipCenter { index }
        } else {
            TickDecision::Capture { index, target }
        }
    }
}
