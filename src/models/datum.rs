use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Compression used for an encoded still.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ImageEncoding {
    #[default]
    Png,
    Jpeg,
}

impl ImageEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpg",
        }
    }
}

/// A compressed still image. Clones share the underlying bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Arc<[u8]>,
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, encoding: ImageEncoding, width: u32, height: u32) -> Self {
        Self {
            bytes: Arc::from(bytes),
            encoding,
            width,
            height,
        }
    }

    /// Empty or zero-sized images are never stored in a datum or exported.
    pub fn is_valid(&self) -> bool {
        !self.bytes.is_empty() && self.width > 0 && self.height > 0
    }
}

/// One observation tying image(s) to a target and a wall-clock timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedDatum {
    pub images: Vec<EncodedImage>,
    pub target_x: f64,
    pub target_y: f64,
    pub timestamp_ms: i64,
}

impl CapturedDatum {
    /// Builds a datum from the valid subset of `images`; `None` when nothing
    /// usable remains.
    pub fn from_images(
        images: Vec<EncodedImage>,
        target_x: f64,
        target_y: f64,
        timestamp_ms: i64,
    ) -> Option<Self> {
        let images: Vec<EncodedImage> = images.into_iter().filter(|img| img.is_valid()).collect();
        if images.is_empty() {
            return None;
        }
        Some(Self {
            images,
            target_x,
            target_y,
            timestamp_ms,
        })
    }
}

/// Per-phase record written next to each datum's images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatumRecord {
    pub target_x: f64,
    pub target_y: f64,
    pub timestamp: i64,
}

impl From<&CapturedDatum> for DatumRecord {
    fn from(datum: &CapturedDatum) -> Self {
        Self {
            target_x: datum.target_x,
            target_y: datum.target_y,
            timestamp: datum.timestamp_ms,
        }
    }
}

/// Data captured during one phase, in trigger order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseDataset {
    data: Vec<CapturedDatum>,
}

impl PhaseDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, datum: CapturedDatum) {
        self.data.push(datum);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedDatum> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[CapturedDatum] {
        &self.data
    }
}
