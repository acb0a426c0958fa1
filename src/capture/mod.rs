pub mod controller;
pub mod state;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::CaptureError;
use crate::models::CapturedDatum;
use crate::settings::ExperimentSettings;

pub use controller::CaptureController;
pub use state::{CaptureState, CaptureStatus, ClickRequest, StepOutcome, TickDecision};

/// What advances a capture phase from one target to the next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    /// One capture per explicit participant action.
    Click,
    /// One capture per elapsed display duration.
    Gaze,
}

/// Where a click-driven capture gets its image from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClickCapturePolicy {
    /// Snapshot and encode the current frame when the click lands.
    OnDemand,
    /// Attach the most recent frame from the continuous buffer.
    LatestBuffered,
}

impl ClickCapturePolicy {
    pub fn uses_buffer(&self) -> bool {
        matches!(self, ClickCapturePolicy::LatestBuffered)
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub trigger: TriggerMode,
    pub click_policy: ClickCapturePolicy,
    pub jpeg_quality: u8,
    pub display_duration: Duration,
    pub tick_interval: Duration,
    pub frames_per_capture: usize,
}

impl CaptureConfig {
    pub fn from_settings(trigger: TriggerMode, settings: &ExperimentSettings) -> Self {
        Self {
            trigger,
            click_policy: settings.click.policy,
            jpeg_quality: settings.click.jpeg_quality,
            display_duration: Duration::from_millis(settings.gaze.display_duration_ms.max(1)),
            tick_interval: settings.gaze.tick_interval(),
            frames_per_capture: settings.gaze.frames_per_capture.max(1),
        }
    }

    /// Whether the phase needs the continuous frame buffer running.
    pub fn uses_buffer(&self) -> bool {
        match self.trigger {
            TriggerMode::Gaze => true,
            TriggerMode::Click => self.click_policy.uses_buffer(),
        }
    }
}

/// Messages a capture controller sends to whoever owns the phase dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Captured { index: usize, datum: CapturedDatum },
    Warning { index: usize, error: CaptureError },
    Completed,
}
