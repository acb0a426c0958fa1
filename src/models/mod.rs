pub mod datum;
pub mod metadata;
pub mod target;

pub use datum::{CapturedDatum, EncodedImage, ImageEncoding, PhaseDataset};
pub use metadata::{DeviceClass, Gender, Presence, Resolution, SessionMetadata};
pub use target::{GridCell, Target, Viewport};
