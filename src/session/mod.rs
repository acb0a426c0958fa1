pub mod orchestrator;
pub mod phase;

pub use orchestrator::{ActiveCapture, ActivePhase, ClickFeedback, SessionOrchestrator};
pub use phase::{default_plan, gaze_plan, CaptureTask, PhaseKind, PhasePlan, PhaseSpec};
