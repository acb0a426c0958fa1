use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::capture::TriggerMode;
use crate::sequence::SequenceKind;
use crate::settings::ExperimentSettings;

/// Layout and trigger of one capture phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureTask {
    pub sequence: SequenceKind,
    pub trigger: TriggerMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhaseKind {
    Metadata,
    Alignment,
    Capture(CaptureTask),
    Export,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: PhaseKind,
}

impl PhaseSpec {
    pub fn new(name: impl Into<String>, kind: PhaseKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn capture(name: impl Into<String>, sequence: SequenceKind, trigger: TriggerMode) -> Self {
        Self::new(name, PhaseKind::Capture(CaptureTask { sequence, trigger }))
    }
}

/// Ordered, validated list of phases. Each phase's successor is simply the
/// next entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    phases: Vec<PhaseSpec>,
}

impl PhasePlan {
    pub fn new(phases: Vec<PhaseSpec>) -> Result<Self> {
        let Some((last, body)) = phases.split_last() else {
            bail!("phase plan is empty");
        };
        if last.kind != PhaseKind::Export {
            bail!("phase plan must end with an export phase, found {:?}", last.name);
        }
        if body.is_empty() {
            bail!("phase plan has nothing to export");
        }
        if phases[0].kind != PhaseKind::Metadata {
            bail!("phase plan must open with the metadata phase");
        }
        if let Some(extra) = body[1..].iter().find(|p| p.kind == PhaseKind::Metadata) {
            bail!("metadata phase {:?} may only appear first", extra.name);
        }
        if let Some(extra) = body.iter().find(|p| p.kind == PhaseKind::Export) {
            bail!("export phase {:?} must be the last phase", extra.name);
        }

        {
            let mut seen = HashSet::new();
            for phase in &phases {
                if phase.name.trim().is_empty() {
                    bail!("phase names must not be blank");
                }
                if !seen.insert(phase.name.as_str()) {
                    bail!("duplicate phase name {:?}", phase.name);
                }
                if let PhaseKind::Capture(task) = &phase.kind {
                    task.sequence.validate()?;
                }
            }
        }

        Ok(Self { phases })
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    /// Names of the capture phases, in plan order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .filter(|p| matches!(p.kind, PhaseKind::Capture(_)))
            .map(|p| p.name.as_str())
    }
}

/// Metadata, face alignment, two rounds of clicked grid + radial tasks, export.
pub fn default_plan(settings: &ExperimentSettings) -> Result<PhasePlan> {
    let grid = SequenceKind::grid_from(settings);
    let radial = SequenceKind::radial_from(settings);

    PhasePlan::new(vec![
        PhaseSpec::new("metadata", PhaseKind::Metadata),
        PhaseSpec::new("face-center", PhaseKind::Alignment),
        PhaseSpec::capture("grid_fixation_click_1", grid, TriggerMode::Click),
        PhaseSpec::capture("radial_saccade_click_1", radial, TriggerMode::Click),
        PhaseSpec::capture("grid_fixation_click_2", grid, TriggerMode::Click),
        PhaseSpec::capture("radial_saccade_click_2", radial, TriggerMode::Click),
        PhaseSpec::new("export", PhaseKind::Export),
    ])
}

/// Gaze-driven counterpart of [`default_plan`].
pub fn gaze_plan(settings: &ExperimentSettings) -> Result<PhasePlan> {
    PhasePlan::new(vec![
        PhaseSpec::new("metadata", PhaseKind::Metadata),
        PhaseSpec::new("face-center", PhaseKind::Alignment),
        PhaseSpec::capture(
            "grid_fixation_gaze",
            SequenceKind::grid_from(settings),
            TriggerMode::Gaze,
        ),
        PhaseSpec::capture(
            "radial_saccade_gaze",
            SequenceKind::radial_from(settings),
            TriggerMode::Gaze,
        ),
        PhaseSpec::new("export", PhaseKind::Export),
    ])
}
