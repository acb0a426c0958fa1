use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::error::CaptureError;
use crate::frames::{snapshot, FrameRingBuffer, VideoSource};
use crate::models::{EncodedImage, ImageEncoding, Target};
use crate::sequence::TargetSequence;

use super::{
    CaptureConfig, CaptureEvent, CaptureState, ClickCapturePolicy, StepOutcome, TickDecision,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Drives one capture phase: turns clicks or elapsed time into captured data
/// and reports everything over `events`.
#[derive(Clone)]
pub struct CaptureController {
    phase: Arc<str>,
    state: Arc<Mutex<CaptureState>>,
    source: Arc<dyn VideoSource>,
    frames: FrameRingBuffer,
    config: CaptureConfig,
    events: mpsc::UnboundedSender<CaptureEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl CaptureController {
    pub fn new(
        phase: &str,
        sequence: TargetSequence,
        source: Arc<dyn VideoSource>,
        frames: FrameRingBuffer,
        config: CaptureConfig,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        Self {
            phase: Arc::from(phase),
            state: Arc::new(Mutex::new(CaptureState::new(Arc::new(sequence)))),
            source,
            frames,
            config,
            events,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub async fn snapshot(&self) -> CaptureState {
        self.state.lock().await.clone()
    }

    pub async fn current_target(&self) -> Option<Target> {
        self.state.lock().await.current_target()
    }

    fn emit(&self, event: CaptureEvent) {
        // The receiver only disappears when the phase has been torn down.
        let _ = self.events.send(event);
    }

    fn warn(&self, index: usize, error: CaptureError) {
        log_warn!("[{}] target {}: {}", self.phase, index, error);
        self.emit(CaptureEvent::Warning { index, error });
    }

    /// Handles one participant click on the current target.
    pub async fn trigger(&self) -> Result<StepOutcome, CaptureError> {
        let request = self.state.lock().await.begin_click(now_ms())?;

        let images = if request.needs_image {
            match self.obtain_images(request.index).await {
                Ok(images) => images,
                Err(err) => {
                    self.warn(request.index, err.clone());
                    return Err(err);
                }
            }
        } else {
            Vec::new()
        };

        let result = self.state.lock().await.finish_click(&request, images);
        match result {
            Ok(outcome) => {
                match &outcome.datum {
                    Some(datum) => self.emit(CaptureEvent::Captured {
                        index: outcome.index,
                        datum: datum.clone(),
                    }),
                    None => {
                        log_debug!("[{}] repeated center at {} skipped", self.phase, outcome.index)
                    }
                }
                if outcome.completed {
                    log_info!("[{}] all targets clicked", self.phase);
                    self.emit(CaptureEvent::Completed);
                }
                Ok(outcome)
            }
            Err(err) => {
                self.warn(request.index, err.clone());
                Err(err)
            }
        }
    }

    async fn obtain_images(&self, index: usize) -> Result<Vec<EncodedImage>, CaptureError> {
        match self.config.click_policy {
            ClickCapturePolicy::OnDemand => {
                let source = Arc::clone(&self.source);
                let quality = self.config.jpeg_quality;
                let image = tokio::task::spawn_blocking(move || {
                    snapshot(source.as_ref(), ImageEncoding::Jpeg, quality)
                })
                .await
                .map_err(|err| {
                    CaptureError::Encode(format!("snapshot worker join failed: {err}"))
                })??;
                Ok(vec![image])
            }
            ClickCapturePolicy::LatestBuffered => self
                .frames
                .latest()
                .filter(EncodedImage::is_valid)
                .map(|image| vec![image])
                .ok_or(CaptureError::Empty { index }),
        }
    }

    /// Processes one gaze tick at `elapsed_ms` since the phase started.
    /// Returns true once the phase is complete.
    pub async fn tick(&self, elapsed_ms: u64) -> bool {
        let display_ms = self.config.display_duration.as_millis() as u64;
        let mut state = self.state.lock().await;

        match state.on_tick(elapsed_ms, display_ms) {
            TickDecision::Pending { .. } | TickDecision::Idle => {}
            TickDecision::SkipCenter { index } => {
                log_debug!("[{}] repeated center at {} skipped", self.phase, index);
            }
            TickDecision::Capture { index, target } => {
                let frames = self.frames.recent(self.config.frames_per_capture);
                match state.record(target, frames, now_ms()) {
                    Some(datum) => self.emit(CaptureEvent::Captured { index, datum }),
                    None => self.warn(index, CaptureError::Empty { index }),
                }
            }
            TickDecision::Completed => {
                log_info!("[{}] display sequence finished after {}ms", self.phase, elapsed_ms);
                self.emit(CaptureEvent::Completed);
            }
        }

        state.is_completed()
    }

    /// Starts the recurring gaze tick. The first target is shown only once
    /// the frame buffer holds a frame, and elapsed time counts from then.
    pub async fn start_ticking(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            if controller.frames.is_empty() {
                log_debug!("[{}] waiting for the first buffered frame", controller.phase);
                controller.frames.wait_for_frame().await;
            }
            let started = Instant::now();
            let mut interval = time::interval(tick_interval);
            // A late tick is coalesced by the elapsed-time index, not replayed.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if controller.tick(elapsed_ms).await {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    /// Stops the gaze tick and waits until it can no longer fire.
    pub async fn stop(&self) {
        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}
