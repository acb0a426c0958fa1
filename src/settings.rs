use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::alignment::AlignmentThresholds;
use crate::capture::ClickCapturePolicy;
use crate::models::ImageEncoding;

/// Environment variable naming a JSON settings file.
pub const SETTINGS_ENV: &str = "GAZECAP_SETTINGS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridSettings {
    /// Cells per side.
    pub size: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { size: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RadialSettings {
    pub circles: u32,
    pub lines: u32,
    /// Outermost radius as a fraction of the viewport height.
    pub max_radius_ratio: f64,
}

impl Default for RadialSettings {
    fn default() -> Self {
        Self {
            circles: 4,
            lines: 6,
            max_radius_ratio: 0.45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GazeSettings {
    pub display_duration_ms: u64,
    pub tick_interval_ms: u64,
    pub frames_per_capture: usize,
}

impl Default for GazeSettings {
    fn default() -> Self {
        Self {
            display_duration_ms: 1500,
            tick_interval_ms: 50,
            frames_per_capture: 3,
        }
    }
}

impl GazeSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameSettings {
    pub capacity: usize,
    pub sample_interval_ms: u64,
    pub encoding: ImageEncoding,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            capacity: 5,
            sample_interval_ms: 16,
            encoding: ImageEncoding::Png,
        }
    }
}

impl FrameSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClickSettings {
    pub policy: ClickCapturePolicy,
    pub jpeg_quality: u8,
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            policy: ClickCapturePolicy::OnDemand,
            jpeg_quality: 92,
        }
    }
}

/// Every tunable of a session. Missing JSON fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentSettings {
    pub grid: GridSettings,
    pub radial: RadialSettings,
    pub gaze: GazeSettings,
    pub frames: FrameSettings,
    pub click: ClickSettings,
    pub alignment: AlignmentThresholds,
}

impl ExperimentSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Loads the file named by [`SETTINGS_ENV`], or defaults when it is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
