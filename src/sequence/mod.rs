pub mod config;
pub mod grid;
pub mod radial;
pub mod shuffle;

use anyhow::Result;
use rand::Rng;

use crate::models::{Target, Viewport};

pub use config::SequenceKind;
pub use grid::grid_sequence;
pub use radial::radial_sequence;
pub use shuffle::fisher_yates;

/// Ordered targets for one phase, frozen once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSequence {
    targets: Vec<Target>,
    center: Option<Target>,
}

impl TargetSequence {
    pub fn new(targets: Vec<Target>, center: Option<Target>) -> Self {
        Self { targets, center }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Target> {
        self.targets.get(index).copied()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// The synthetic return-to-center point, for radial sequences.
    pub fn center(&self) -> Option<Target> {
        self.center
    }

    /// Exact coordinate match against the precomputed center.
    pub fn is_center(&self, target: Target) -> bool {
        self.center == Some(target)
    }
}

/// Generates the sequence for `kind` against the viewport as it is right now.
pub fn generate<R: Rng + ?Sized>(
    kind: &SequenceKind,
    viewport: Viewport,
    rng: &mut R,
) -> Result<TargetSequence> {
    kind.validate()?;
    let sequence = match *kind {
        SequenceKind::Grid { size } => grid_sequence(size, viewport, rng),
        SequenceKind::Radial {
            circles,
            lines,
            max_radius_ratio,
        } => radial_sequence(circles, lines, max_radius_ratio, viewport, rng),
    };
    Ok(sequence)
}
