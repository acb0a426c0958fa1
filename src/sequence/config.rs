use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::settings::ExperimentSettings;

/// Which target layout a capture phase shows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SequenceKind {
    /// Every cell of a `size`×`size` grid, shuffled.
    Grid { size: u32 },

    /// `circles` concentric rings crossed by `lines` spokes, shuffled, with a
    /// return to the center before every target.
    #[serde(rename_all = "camelCase")]
    Radial {
        circles: u32,
        lines: u32,
        /// Outermost radius as a fraction of the viewport height.
        max_radius_ratio: f64,
    },
}

impl SequenceKind {
    pub fn grid_from(settings: &ExperimentSettings) -> Self {
        SequenceKind::Grid {
            size: settings.grid.size,
        }
    }

    pub fn radial_from(settings: &ExperimentSettings) -> Self {
        SequenceKind::Radial {
            circles: settings.radial.circles,
            lines: settings.radial.lines,
            max_radius_ratio: settings.radial.max_radius_ratio,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            SequenceKind::Grid { size } if size == 0 => bail!("grid size must be at least 1"),
            SequenceKind::Radial { circles, lines, .. } if circles == 0 || lines == 0 => {
                bail!("radial layout needs at least one circle and one line")
            }
            SequenceKind::Radial {
                max_radius_ratio, ..
            } if !(max_radius_ratio.is_finite() && max_radius_ratio > 0.0) => {
                bail!("radial max radius ratio must be positive, got {max_radius_ratio}")
            }
            _ => Ok(()),
        }
    }
}
