pub mod alignment;
pub mod capture;
pub mod error;
pub mod export;
pub mod frames;
pub mod models;
pub mod sequence;
pub mod session;
pub mod settings;
pub mod utils;

pub use alignment::{AlignmentGate, AlignmentReading, AlignmentThresholds, FaceDetector};
pub use capture::{CaptureController, CaptureEvent, ClickCapturePolicy, TriggerMode};
pub use error::CaptureError;
pub use export::{DirectorySink, ExportReport, ExportSink, MemorySink, ZipSink};
pub use frames::{FrameRingBuffer, FrameSampler, VideoSource};
pub use models::{CapturedDatum, PhaseDataset, SessionMetadata, Target, Viewport};
pub use sequence::{SequenceKind, TargetSequence};
pub use session::{ActivePhase, ClickFeedback, PhasePlan, SessionOrchestrator};
pub use settings::ExperimentSettings;
pub use utils::logging::init_logging;
