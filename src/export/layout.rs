use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::{datum::DatumRecord, PhaseDataset, SessionMetadata};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const METADATA_FILE: &str = "metadata.json";

/// One file of the exported tree, addressed by a `/`-separated path.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    pub path: String,
    pub contents: Arc<[u8]>,
}

impl BundleEntry {
    fn new(path: String, contents: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path,
            contents: contents.into(),
        }
    }
}

/// The complete file tree of a session export.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub name: String,
    pub entries: Vec<BundleEntry>,
    pub skipped_images: usize,
}

impl Bundle {
    pub fn entry(&self, path: &str) -> Option<&BundleEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }
}

/// Lays out `metadata.json` plus one directory per phase holding each datum's
/// images (`001.png`, or `001_0.png`, `001_1.png`, ... for several) and its
/// `001.json` record.
pub fn build_bundle(
    name: String,
    metadata: &SessionMetadata,
    phases: &[(&str, &PhaseDataset)],
) -> Result<Bundle> {
    let mut entries = Vec::new();
    let mut skipped_images = 0;

    let metadata_json =
        serde_json::to_vec_pretty(metadata).context("failed to serialize session metadata")?;
    entries.push(BundleEntry::new(METADATA_FILE.to_string(), metadata_json));

    for (phase, dataset) in phases {
        for (i, datum) in dataset.iter().enumerate() {
            let ordinal = format!("{:03}", i + 1);
            let multiple = datum.images.len() > 1;

            for (j, image) in datum.images.iter().enumerate() {
                let suffix = if multiple { format!("_{j}") } else { String::new() };
                let file = format!("{phase}/{ordinal}{suffix}.{}", image.encoding.extension());

                if image.is_valid() {
                    entries.push(BundleEntry {
                        path: file,
                        contents: Arc::clone(&image.bytes),
                    });
                } else {
                    skipped_images += 1;
                    log_warn!("skipping unusable image {file}");
                }
            }

            let record = serde_json::to_vec_pretty(&DatumRecord::from(datum))
                .with_context(|| format!("failed to serialize record {phase}/{ordinal}"))?;
            entries.push(BundleEntry::new(format!("{phase}/{ordinal}.json"), record));
        }
    }

    Ok(Bundle {
        name,
        entries,
        skipped_images,
    })
}
