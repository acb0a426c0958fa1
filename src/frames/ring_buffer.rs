use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::models::EncodedImage;

/// Bounded, most-recent-K buffer of encoded frames.
///
/// Written only by the sampling loop and read non-destructively by capture
/// controllers. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct FrameRingBuffer {
    frames: Arc<Mutex<VecDeque<EncodedImage>>>,
    pushed: Arc<Notify>,
    capacity: usize,
}

impl FrameRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Arc::new(Mutex::new(VecDeque::with_capacity(capacity + 1))),
            pushed: Arc::new(Notify::new()),
            capacity,
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<EncodedImage>> {
        match self.frames.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends at the tail, evicting from the head once over capacity.
    pub fn push(&self, frame: EncodedImage) {
        {
            let mut frames = self.guard();
            frames.push_back(frame);
            while frames.len() > self.capacity {
                frames.pop_front();
            }
        }
        self.pushed.notify_waiters();
    }

    /// Resolves once the buffer holds at least one frame.
    pub async fn wait_for_frame(&self) {
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            // Register before checking so a push in between is not missed.
            notified.as_mut().enable();
            if !self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    pub fn latest(&self) -> Option<EncodedImage> {
        self.guard().back().cloned()
    }

    /// Up to `n` most recent frames, oldest first.
    pub fn recent(&self, n: usize) -> Vec<EncodedImage> {
        let frames = self.guard();
        let skip = frames.len().saturating_sub(n);
        frames.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}
