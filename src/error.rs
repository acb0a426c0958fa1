use thiserror::Error;

/// Failures surfaced while trying to capture a datum for a target.
///
/// None of these abort a session; they are reported to the participant as
/// transient warnings (or logged, for timer-driven phases).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("video source is not ready yet, try again in a moment")]
    SourceNotReady,

    #[error("no captured image is available for target {index}, try again in a moment")]
    Empty { index: usize },

    #[error("video device could not be acquired: {0}")]
    DeviceDenied(String),

    #[error("capture for target {requested} arrived after the phase moved on to {current}")]
    Stale { requested: usize, current: usize },

    #[error("phase already completed")]
    PhaseComplete,

    #[error("frame encoding failed: {0}")]
    Encode(String),
}

impl CaptureError {
    /// Whether the participant can simply try the same target again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::SourceNotReady | CaptureError::Empty { .. } | CaptureError::Encode(_)
        )
    }
}
