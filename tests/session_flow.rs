use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use gazecap_lib::alignment::NormalizedBox;
use gazecap_lib::export::Bundle;
use gazecap_lib::models::{DeviceClass, Gender, Presence, Resolution};
use gazecap_lib::session::{PhaseKind, PhaseSpec};
use gazecap_lib::{
    ActivePhase, AlignmentGate, AlignmentReading, CaptureError, ClickFeedback, DirectorySink,
    ExperimentSettings, ExportSink, FaceDetector, MemorySink, PhasePlan, SequenceKind,
    SessionMetadata, SessionOrchestrator, TriggerMode, VideoSource, Viewport, ZipSink,
};
use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;

struct Camera {
    allowed: AtomicBool,
    ready: AtomicBool,
}

impl Camera {
    fn new(allowed: bool) -> Arc<Self> {
        Arc::new(Self {
            allowed: AtomicBool::new(allowed),
            ready: AtomicBool::new(true),
        })
    }
}

impl VideoSource for Camera {
    fn acquire(&self) -> Result<(), CaptureError> {
        if self.allowed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CaptureError::DeviceDenied("permission dismissed".into()))
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        if self.ready.load(Ordering::SeqCst) {
            (16, 12)
        } else {
            (0, 0)
        }
    }

    fn grab(&self) -> Result<RgbaImage> {
        Ok(RgbaImage::from_pixel(16, 12, Rgba([90, 120, 150, 255])))
    }
}

/// Fails the first write, then behaves like a memory sink.
struct FlakySink {
    calls: Arc<AtomicUsize>,
    inner: MemorySink,
}

impl ExportSink for FlakySink {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            bail!("disk full");
        }
        self.inner.write_bundle(bundle)
    }
}

/// Reports the face drifting in from the left edge, one step per frame.
struct DriftingFace {
    x_center: f64,
}

impl FaceDetector for DriftingFace {
    fn detect(&mut self, _frame: &RgbaImage) -> Result<Option<NormalizedBox>> {
        let face = NormalizedBox {
            x_center: self.x_center,
            y_center: 0.5,
            width: 0.225,
            height: 0.3,
        };
        self.x_center = (self.x_center + 0.1).min(0.5);
        Ok(Some(face))
    }
}

fn metadata() -> SessionMetadata {
    SessionMetadata {
        name: "Park Seo".into(),
        device: DeviceClass::MacbookPro14,
        gender: Gender::Female,
        hat: Presence::NotWorn,
        glasses: Presence::Worn,
        resolution: Resolution {
            width: 400,
            height: 200,
        },
    }
}

fn aligned() -> AlignmentReading {
    AlignmentReading {
        aligned: true,
        ..AlignmentReading::not_aligned()
    }
}

fn small_settings() -> ExperimentSettings {
    let mut settings = ExperimentSettings::default();
    settings.grid.size = 2;
    settings.radial.circles = 1;
    settings.radial.lines = 2;
    settings
}

fn click_plan(settings: &ExperimentSettings) -> PhasePlan {
    PhasePlan::new(vec![
        PhaseSpec::new("metadata", PhaseKind::Metadata),
        PhaseSpec::new("face-center", PhaseKind::Alignment),
        PhaseSpec::capture("grid", SequenceKind::grid_from(settings), TriggerMode::Click),
        PhaseSpec::capture("radial", SequenceKind::radial_from(settings), TriggerMode::Click),
        PhaseSpec::new("export", PhaseKind::Export),
    ])
    .unwrap()
}

fn viewport() -> Viewport {
    Viewport::new(400.0, 200.0)
}

async fn click_through(session: &mut SessionOrchestrator, clicks: usize) -> Vec<ClickFeedback> {
    let mut feedback = Vec::new();
    for _ in 0..clicks {
        feedback.push(session.click().await.unwrap());
    }
    feedback
}

#[tokio::test]
async fn click_session_collects_every_target_and_exports_once() {
    let settings = small_settings();
    let plan = click_plan(&settings);
    let sink = MemorySink::new();
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        Camera::new(true),
        Box::new(sink.clone()),
        viewport(),
    )
    .with_seed(3);

    assert!(session.click().await.is_err());
    session.submit_metadata(metadata()).await.unwrap();
    assert!(matches!(session.active(), ActivePhase::Alignment));

    assert!(!session.submit_alignment(&AlignmentReading::not_aligned()).await.unwrap());
    assert!(matches!(session.active(), ActivePhase::Alignment));
    assert!(session.submit_alignment(&aligned()).await.unwrap());
    assert_eq!(session.active().label(), "grid");
    assert_eq!(session.progress().await, Some((0, 4)));

    let feedback = click_through(&mut session, 4).await;
    assert_eq!(
        feedback.last(),
        Some(&ClickFeedback::Advanced {
            index: 3,
            captured: true,
            phase_completed: true,
        })
    );
    assert_eq!(session.active().label(), "radial");

    let grid = session.dataset("grid").unwrap();
    let points: BTreeSet<(i64, i64)> = grid
        .iter()
        .map(|d| (d.target_x.round() as i64, d.target_y.round() as i64))
        .collect();
    assert_eq!(grid.len(), 4);
    assert_eq!(
        points,
        BTreeSet::from([(100, 50), (300, 50), (100, 150), (300, 150)])
    );

    // center, spoke, center again (not recorded), spoke
    let feedback = click_through(&mut session, 4).await;
    let captured: Vec<bool> = feedback
        .iter()
        .map(|f| match f {
            ClickFeedback::Advanced { captured, .. } => *captured,
            ClickFeedback::Retry(err) => panic!("unexpected retry: {err}"),
        })
        .collect();
    assert_eq!(captured, vec![true, true, false, true]);
    assert_eq!(session.dataset("radial").unwrap().len(), 3);

    assert!(session.is_finished());
    let bundles = sink.bundles();
    assert_eq!(bundles.len(), 1);
    let bundle = &bundles[0];
    assert!(bundle.name.ends_with("_Park-Seo_MacBook-Pro-14"));
    // metadata.json + 4 grid (image + record) + 3 radial (image + record)
    assert_eq!(bundle.entries.len(), 1 + 8 + 6);
    assert!(bundle.entry("grid/001.jpg").is_some());
    assert!(bundle.entry("radial/003.json").is_some());
    assert!(bundle.entry("radial/004.jpg").is_none());

    let report = session.export_report().cloned().unwrap();
    assert_eq!(report.location, format!("memory://{}", bundle.name));
    assert_eq!(report.files, 15);
    assert_eq!(session.retry_export().await.unwrap(), report);
    assert_eq!(sink.bundles().len(), 1);
    assert!(session.click().await.is_err());
}

#[tokio::test]
async fn alignment_gate_holds_the_session_until_centered() {
    let settings = small_settings();
    let plan = click_plan(&settings);
    let camera = Camera::new(true);
    let mut gate = AlignmentGate::new(DriftingFace { x_center: 0.2 }, settings.alignment);
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        camera.clone(),
        Box::new(MemorySink::new()),
        viewport(),
    );
    session.submit_metadata(metadata()).await.unwrap();

    let mut attempts = 0;
    loop {
        attempts += 1;
        let reading = gate.check(&*camera, session.viewport()).unwrap();
        if session.submit_alignment(&reading).await.unwrap() {
            break;
        }
        assert!(matches!(session.active(), ActivePhase::Alignment));
        assert!(attempts < 10, "face never aligned");
    }

    assert!(attempts > 1);
    assert_eq!(session.current_phase().unwrap().name, "grid");
    assert!(session.current_target().await.is_some());
}

#[tokio::test]
async fn click_before_first_frame_asks_for_another_click() {
    let settings = small_settings();
    let plan = click_plan(&settings);
    let camera = Camera::new(true);
    camera.ready.store(false, Ordering::SeqCst);
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        camera.clone(),
        Box::new(MemorySink::new()),
        viewport(),
    );
    session.submit_metadata(metadata()).await.unwrap();
    session.submit_alignment(&aligned()).await.unwrap();

    assert_eq!(
        session.click().await.unwrap(),
        ClickFeedback::Retry(CaptureError::SourceNotReady)
    );
    assert_eq!(session.progress().await, Some((0, 4)));
    assert_eq!(session.last_warning(), Some(&CaptureError::SourceNotReady));
    assert!(session.dataset("grid").unwrap().is_empty());

    camera.ready.store(true, Ordering::SeqCst);
    assert!(matches!(
        session.click().await.unwrap(),
        ClickFeedback::Advanced { index: 0, captured: true, .. }
    ));
    assert_eq!(session.progress().await, Some((1, 4)));
}

#[tokio::test]
async fn denied_camera_blocks_capture_until_reacquired() {
    let settings = small_settings();
    let plan = click_plan(&settings);
    let camera = Camera::new(false);
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        camera.clone(),
        Box::new(MemorySink::new()),
        viewport(),
    );

    session.submit_metadata(metadata()).await.unwrap();
    session.submit_alignment(&aligned()).await.unwrap();
    match session.active() {
        ActivePhase::Blocked { phase, error } => {
            assert_eq!(phase, "grid");
            assert!(matches!(error, CaptureError::DeviceDenied(_)));
        }
        other => panic!("expected a blocked phase, got {}", other.label()),
    }
    assert!(session.click().await.is_err());
    let err = session.retry_device().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CaptureError>(),
        Some(CaptureError::DeviceDenied(_))
    ));

    camera.allowed.store(true, Ordering::SeqCst);
    session.retry_device().await.unwrap();
    assert!(matches!(session.active(), ActivePhase::Capture(_)));
    assert!(matches!(
        session.click().await.unwrap(),
        ClickFeedback::Advanced { index: 0, captured: true, .. }
    ));
}

#[tokio::test]
async fn failed_export_can_be_retried_without_duplicating() {
    let settings = ExperimentSettings::default();
    let plan = PhasePlan::new(vec![
        PhaseSpec::new("metadata", PhaseKind::Metadata),
        PhaseSpec::capture("single", SequenceKind::Grid { size: 1 }, TriggerMode::Click),
        PhaseSpec::new("export", PhaseKind::Export),
    ])
    .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = MemorySink::new();
    let sink = FlakySink {
        calls: calls.clone(),
        inner: inner.clone(),
    };
    let mut session =
        SessionOrchestrator::new(settings, plan, Camera::new(true), Box::new(sink), viewport());

    session.submit_metadata(metadata()).await.unwrap();
    let err = session.click().await.unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    assert!(matches!(session.active(), ActivePhase::Export));
    assert_eq!(session.dataset("single").unwrap().len(), 1);

    let report = session.retry_export().await.unwrap();
    assert_eq!(report.files, 3);
    assert!(session.is_finished());

    session.retry_export().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(inner.bundles().len(), 1);
}

#[tokio::test]
async fn directory_sink_receives_the_bundle_tree() {
    let root = tempfile::tempdir().unwrap();
    let settings = small_settings();
    let plan = click_plan(&settings);
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        Camera::new(true),
        Box::new(DirectorySink::new(root.path())),
        viewport(),
    );

    session.submit_metadata(metadata()).await.unwrap();
    session.submit_alignment(&aligned()).await.unwrap();
    click_through(&mut session, 8).await;

    let report = session.export_report().cloned().unwrap();
    let dir = std::path::PathBuf::from(&report.location);
    assert!(dir.starts_with(root.path()));

    let written: SessionMetadata =
        serde_json::from_slice(&std::fs::read(dir.join("metadata.json")).unwrap()).unwrap();
    assert_eq!(written, metadata());

    let record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.join("grid/002.json")).unwrap()).unwrap();
    assert!(record["targetX"].is_number());
    assert!(record["timestamp"].is_number());

    let jpeg = std::fs::read(dir.join("radial/001.jpg")).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn zip_sink_produces_one_archive_per_session() {
    let root = tempfile::tempdir().unwrap();
    let settings = small_settings();
    let plan = click_plan(&settings);
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        Camera::new(true),
        Box::new(ZipSink::new(root.path())),
        viewport(),
    );

    session.submit_metadata(metadata()).await.unwrap();
    session.submit_alignment(&aligned()).await.unwrap();
    click_through(&mut session, 8).await;

    let report = session.export_report().cloned().unwrap();
    assert!(report.location.ends_with("_Park-Seo_MacBook-Pro-14.zip"));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);

    let file = std::fs::File::open(&report.location).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), report.files);
    let metadata_json = archive.by_name("metadata.json").unwrap();
    let written: SessionMetadata = serde_json::from_reader(metadata_json).unwrap();
    assert_eq!(written, metadata());
    assert!(archive.by_name("grid/004.jpg").is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gaze_phase_runs_to_completion_on_its_own() {
    let mut settings = small_settings();
    settings.gaze.display_duration_ms = 150;
    settings.gaze.tick_interval_ms = 5;
    settings.frames.sample_interval_ms = 5;
    let plan = PhasePlan::new(vec![
        PhaseSpec::new("metadata", PhaseKind::Metadata),
        PhaseSpec::capture("grid_gaze", SequenceKind::grid_from(&settings), TriggerMode::Gaze),
        PhaseSpec::new("export", PhaseKind::Export),
    ])
    .unwrap();
    let sink = MemorySink::new();
    let mut session = SessionOrchestrator::new(
        settings,
        plan,
        Camera::new(true),
        Box::new(sink.clone()),
        viewport(),
    );

    session.submit_metadata(metadata()).await.unwrap();
    assert!(session.click().await.is_err());

    let captured = tokio::time::timeout(Duration::from_secs(10), session.run_gaze_phase())
        .await
        .expect("gaze phase should finish")
        .unwrap();

    assert_eq!(captured, 4);
    assert!(session.last_warning().is_none());
    let dataset = session.dataset("grid_gaze").unwrap();
    let points: BTreeSet<(i64, i64)> = dataset
        .iter()
        .map(|d| (d.target_x.round() as i64, d.target_y.round() as i64))
        .collect();
    assert_eq!(points.len(), 4);
    assert!(dataset
        .iter()
        .all(|d| (1..=3).contains(&d.images.len())));
    assert!(session.is_finished());
    assert_eq!(sink.bundles().len(), 1);
    assert!(session.frames().len() <= 5);
}
