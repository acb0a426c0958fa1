pub mod layout;
pub mod naming;
pub mod sink;

use serde::Serialize;

pub use layout::{build_bundle, Bundle, BundleEntry};
pub use naming::{bundle_name, sanitize};
pub use sink::{DirectorySink, ExportSink, MemorySink, ZipSink};

/// What one export produced.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub location: String,
    pub files: usize,
    pub skipped_images: usize,
}
