use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::Local;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc;

use crate::alignment::AlignmentReading;
use crate::capture::{CaptureConfig, CaptureController, CaptureEvent, TriggerMode};
use crate::error::CaptureError;
use crate::export::{build_bundle, bundle_name, ExportReport, ExportSink};
use crate::frames::{FrameRingBuffer, FrameSampler, VideoSource};
use crate::models::{PhaseDataset, SessionMetadata, Target, Viewport};
use crate::sequence;
use crate::settings::ExperimentSettings;

use super::phase::{CaptureTask, PhaseKind, PhasePlan, PhaseSpec};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// A capture phase that is currently running.
pub struct ActiveCapture {
    name: String,
    trigger: TriggerMode,
    controller: CaptureController,
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    sampler: Option<FrameSampler>,
}

impl ActiveCapture {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> TriggerMode {
        self.trigger
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }
}

/// The phase the session is in right now.
pub enum ActivePhase {
    Metadata,
    Alignment,
    Capture(ActiveCapture),
    /// A capture phase that cannot run because live video is unavailable.
    Blocked { phase: String, error: CaptureError },
    /// Export in progress, or failed and awaiting [`SessionOrchestrator::retry_export`].
    Export,
    Finished(ExportReport),
}

impl ActivePhase {
    pub fn label(&self) -> &str {
        match self {
            ActivePhase::Metadata => "metadata",
            ActivePhase::Alignment => "alignment",
            ActivePhase::Capture(active) => &active.name,
            ActivePhase::Blocked { phase, .. } => phase,
            ActivePhase::Export => "export",
            ActivePhase::Finished(_) => "finished",
        }
    }
}

/// Result of one click as the participant sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickFeedback {
    /// The step advanced; `captured` is false for a repeated center.
    Advanced {
        index: usize,
        captured: bool,
        phase_completed: bool,
    },
    /// Nothing was recorded; show the warning and let them click again.
    Retry(CaptureError),
}

#[derive(Debug, Clone, PartialEq)]
enum VideoStatus {
    Ready,
    Denied(String),
}

/// Walks a participant through the phase plan, owns every phase's dataset
/// and performs the final export.
pub struct SessionOrchestrator {
    settings: ExperimentSettings,
    plan: PhasePlan,
    cursor: usize,
    active: ActivePhase,
    metadata: Option<SessionMetadata>,
    datasets: BTreeMap<String, PhaseDataset>,
    video: Arc<dyn VideoSource>,
    video_status: VideoStatus,
    frames: FrameRingBuffer,
    sink: Box<dyn ExportSink>,
    viewport: Viewport,
    rng: StdRng,
    last_warning: Option<CaptureError>,
    export_report: Option<ExportReport>,
}

impl SessionOrchestrator {
    /// Acquires the video device once; a denial is reported here and blocks
    /// every capture phase later on.
    pub fn new(
        settings: ExperimentSettings,
        plan: PhasePlan,
        video: Arc<dyn VideoSource>,
        sink: Box<dyn ExportSink>,
        viewport: Viewport,
    ) -> Self {
        let video_status = match video.acquire() {
            Ok(()) => VideoStatus::Ready,
            Err(err) => {
                log_error!("camera unavailable: {err}");
                VideoStatus::Denied(err.to_string())
            }
        };

        let frames = FrameRingBuffer::new(settings.frames.capacity);

        Self {
            settings,
            plan,
            cursor: 0,
            active: ActivePhase::Metadata,
            metadata: None,
            datasets: BTreeMap::new(),
            video,
            video_status,
            frames,
            sink,
            viewport,
            rng: StdRng::from_entropy(),
            last_warning: None,
            export_report: None,
        }
    }

    /// Makes target shuffling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    pub fn plan(&self) -> &PhasePlan {
        &self.plan
    }

    pub fn active(&self) -> &ActivePhase {
        &self.active
    }

    pub fn current_phase(&self) -> Option<&PhaseSpec> {
        self.plan.get(self.cursor)
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    pub fn dataset(&self, phase: &str) -> Option<&PhaseDataset> {
        self.datasets.get(phase)
    }

    pub fn datasets(&self) -> &BTreeMap<String, PhaseDataset> {
        &self.datasets
    }

    pub fn frames(&self) -> &FrameRingBuffer {
        &self.frames
    }

    /// Most recent capture warning, for display.
    pub fn last_warning(&self) -> Option<&CaptureError> {
        self.last_warning.as_ref()
    }

    pub fn export_report(&self) -> Option<&ExportReport> {
        self.export_report.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.active, ActivePhase::Finished(_))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Records a viewport change; it applies from the next generated sequence.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Target on screen in the running capture phase.
    pub async fn current_target(&self) -> Option<Target> {
        match &self.active {
            ActivePhase::Capture(active) => active.controller.current_target().await,
            _ => None,
        }
    }

    /// `(index, total)` of the running capture phase.
    pub async fn progress(&self) -> Option<(usize, usize)> {
        match &self.active {
            ActivePhase::Capture(active) => {
                let state = active.controller.snapshot().await;
                Some((state.current_index(), state.sequence().len()))
            }
            _ => None,
        }
    }

    pub async fn submit_metadata(&mut self, metadata: SessionMetadata) -> Result<()> {
        ensure!(
            matches!(self.active, ActivePhase::Metadata),
            "metadata is not expected during {}",
            self.active.label()
        );
        metadata.validate()?;

        log_info!("metadata recorded for {}", metadata.name.trim());
        self.metadata = Some(metadata);
        self.advance().await
    }

    /// Advances past the alignment gate when `reading` is aligned.
    pub async fn submit_alignment(&mut self, reading: &AlignmentReading) -> Result<bool> {
        ensure!(
            matches!(self.active, ActivePhase::Alignment),
            "no alignment phase is active (in {})",
            self.active.label()
        );
        if !reading.aligned {
            return Ok(false);
        }
        self.advance().await?;
        Ok(true)
    }

    /// Handles a click on the current target of a click-driven phase. A
    /// transient capture failure comes back as [`ClickFeedback::Retry`];
    /// anything else is an error.
    pub async fn click(&mut self) -> Result<ClickFeedback> {
        let controller = match &self.active {
            ActivePhase::Capture(active) if active.trigger == TriggerMode::Click => {
                active.controller.clone()
            }
            ActivePhase::Capture(active) => bail!("phase {} is timer-driven", active.name),
            other => bail!("no capture phase is active (in {})", other.label()),
        };

        let result = controller.trigger().await;
        let completed = self.drain_events();

        match result {
            Ok(outcome) => {
                if completed {
                    self.advance().await?;
                }
                Ok(ClickFeedback::Advanced {
                    index: outcome.index,
                    captured: outcome.datum.is_some(),
                    phase_completed: outcome.completed,
                })
            }
            Err(err) if err.is_retryable() => Ok(ClickFeedback::Retry(err)),
            Err(err) => {
                Err(err).with_context(|| format!("click rejected in {}", controller.phase()))
            }
        }
    }

    /// Waits for the next event of the running gaze phase and applies it.
    /// A completion moves the session to the next phase.
    pub async fn next_event(&mut self) -> Result<CaptureEvent> {
        let active = match &mut self.active {
            ActivePhase::Capture(active) => active,
            other => bail!("no capture phase is active (in {})", other.label()),
        };
        let name = active.name.clone();
        let event = active
            .events
            .recv()
            .await
            .ok_or_else(|| anyhow!("capture controller for {name} went away"))?;

        let completed = apply_event(
            &mut self.datasets,
            &mut self.last_warning,
            &name,
            event.clone(),
        );
        if completed {
            self.advance().await?;
        }
        Ok(event)
    }

    /// Runs the current gaze phase to completion; returns its dataset size.
    pub async fn run_gaze_phase(&mut self) -> Result<usize> {
        let name = match &self.active {
            ActivePhase::Capture(active) if active.trigger == TriggerMode::Gaze => {
                active.name.clone()
            }
            other => bail!("no gaze phase is active (in {})", other.label()),
        };

        while !matches!(self.next_event().await?, CaptureEvent::Completed) {}

        Ok(self.datasets.get(&name).map_or(0, PhaseDataset::len))
    }

    /// Re-attempts a failed export. Never writes a second bundle.
    pub async fn retry_export(&mut self) -> Result<ExportReport> {
        if matches!(self.active, ActivePhase::Export) {
            self.enter_current().await?;
        } else if !self.is_finished() {
            bail!("export is not due yet (in {})", self.active.label());
        }
        self.export_report
            .clone()
            .ok_or_else(|| anyhow!("export did not complete"))
    }

    /// Re-acquires the video device for a blocked capture phase and starts
    /// the phase when that succeeds.
    pub async fn retry_device(&mut self) -> Result<()> {
        let ActivePhase::Blocked { error, .. } = &self.active else {
            return Ok(());
        };
        let previous = error.clone();

        self.video.acquire()?;
        self.video_status = VideoStatus::Ready;
        log_info!("camera acquired after earlier failure: {previous}");
        self.enter_current().await
    }

    /// Stops every repeating task of the running phase, e.g. when the
    /// session is abandoned.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.leave_current().await
    }

    fn drain_events(&mut self) -> bool {
        let ActivePhase::Capture(active) = &mut self.active else {
            return false;
        };

        let mut completed = false;
        while let Ok(event) = active.events.try_recv() {
            completed |= apply_event(
                &mut self.datasets,
                &mut self.last_warning,
                &active.name,
                event,
            );
        }
        completed
    }

    async fn advance(&mut self) -> Result<()> {
        self.leave_current().await?;
        ensure!(self.cursor + 1 < self.plan.len(), "session already at its last phase");
        self.cursor += 1;
        self.enter_current().await
    }

    async fn leave_current(&mut self) -> Result<()> {
        if let ActivePhase::Capture(active) = &mut self.active {
            active.controller.stop().await;
            if let Some(sampler) = active.sampler.as_mut() {
                sampler.stop().await?;
            }
            active.sampler = None;
            self.drain_events();
        }
        Ok(())
    }

    async fn enter_current(&mut self) -> Result<()> {
        let spec = self
            .plan
            .get(self.cursor)
            .cloned()
            .context("phase cursor ran past the plan")?;
        log_info!("entering phase {}", spec.name);

        self.active = match spec.kind {
            PhaseKind::Metadata => ActivePhase::Metadata,
            PhaseKind::Alignment => ActivePhase::Alignment,
            PhaseKind::Capture(task) => {
                if let VideoStatus::Denied(reason) = &self.video_status {
                    let error = CaptureError::DeviceDenied(reason.clone());
                    log_warn!("phase {} blocked: {error}", spec.name);
                    ActivePhase::Blocked {
                        phase: spec.name,
                        error,
                    }
                } else {
                    ActivePhase::Capture(self.start_capture(&spec.name, task).await?)
                }
            }
            PhaseKind::Export => {
                self.active = ActivePhase::Export;
                ActivePhase::Finished(self.export_once()?)
            }
        };
        Ok(())
    }

    async fn start_capture(&mut self, name: &str, task: CaptureTask) -> Result<ActiveCapture> {
        let sequence = sequence::generate(&task.sequence, self.viewport, &mut self.rng)
            .with_context(|| format!("failed to generate targets for {name}"))?;
        let config = CaptureConfig::from_settings(task.trigger, &self.settings);

        let sampler = if config.uses_buffer() {
            let mut sampler = FrameSampler::new(self.frames.clone());
            sampler.start(
                Arc::clone(&self.video),
                self.settings.frames.sample_interval(),
                self.settings.frames.encoding,
                self.settings.click.jpeg_quality,
            )?;
            Some(sampler)
        } else {
            None
        };

        log_info!("{name}: {} targets, {:?}-driven", sequence.len(), task.trigger);
        self.datasets.entry(name.to_string()).or_default();

        let (tx, rx) = mpsc::unbounded_channel();
        let controller = CaptureController::new(
            name,
            sequence,
            Arc::clone(&self.video),
            self.frames.clone(),
            config,
            tx,
        );
        if task.trigger == TriggerMode::Gaze {
            controller.start_ticking().await;
        }

        Ok(ActiveCapture {
            name: name.to_string(),
            trigger: task.trigger,
            controller,
            events: rx,
            sampler,
        })
    }

    fn export_once(&mut self) -> Result<ExportReport> {
        if let Some(report) = &self.export_report {
            return Ok(report.clone());
        }

        let metadata = self
            .metadata
            .as_ref()
            .context("cannot export before metadata is submitted")?;
        let phases: Vec<(&str, &PhaseDataset)> = self
            .plan
            .capture_names()
            .filter_map(|name| self.datasets.get(name).map(|data| (name, data)))
            .collect();

        let bundle = build_bundle(bundle_name(&Local::now(), metadata), metadata, &phases)?;
        let location = self
            .sink
            .write_bundle(&bundle)
            .with_context(|| format!("failed to write bundle {}", bundle.name))?;

        let report = ExportReport {
            location,
            files: bundle.entries.len(),
            skipped_images: bundle.skipped_images,
        };
        log_info!("session exported to {} ({} files)", report.location, report.files);
        self.export_report = Some(report.clone());
        Ok(report)
    }
}

/// Folds one controller event into the session; true on phase completion.
fn apply_event(
    datasets: &mut BTreeMap<String, PhaseDataset>,
    last_warning: &mut Option<CaptureError>,
    phase: &str,
    event: CaptureEvent,
) -> bool {
    match event {
        CaptureEvent::Captured { datum, .. } => {
            datasets.entry(phase.to_string()).or_default().push(datum);
            false
        }
        CaptureEvent::Warning { error, .. } => {
            *last_warning = Some(error);
            false
        }
        CaptureEvent::Completed => true,
    }
}
