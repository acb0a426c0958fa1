use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::ImageEncoding;

use super::{loop_worker::sampling_loop, FrameRingBuffer, VideoSource};

/// Owns the background task that keeps a [`FrameRingBuffer`] filled.
pub struct FrameSampler {
    buffer: FrameRingBuffer,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl FrameSampler {
    pub fn new(buffer: FrameRingBuffer) -> Self {
        Self {
            buffer,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn buffer(&self) -> &FrameRingBuffer {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        source: Arc<dyn VideoSource>,
        interval: Duration,
        encoding: ImageEncoding,
        jpeg_quality: u8,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("frame sampling already active");
        }

        // Frames from an earlier phase must never be attached to this one.
        self.buffer.clear();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            source,
            self.buffer.clone(),
            interval,
            encoding,
            jpeg_quality,
            cancel_token.clone(),
        ));

        info!("frame sampling started every {}ms", interval.as_millis());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    /// Each grab paints the next counter value into the red channel.
    struct CountingSource {
        ready: AtomicBool,
        counter: AtomicU8,
    }

    impl CountingSource {
        fn new(ready: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
                counter: AtomicU8::new(0),
            }
        }
    }

    impl VideoSource for CountingSource {
        fn frame_size(&self) -> (u32, u32) {
            if self.ready.load(Ordering::SeqCst) {
                (4, 4)
            } else {
                (0, 0)
            }
        }

        fn grab(&self) -> anyhow::Result<RgbaImage> {
            let value = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::from_pixel(4, 4, Rgba([value, 0, 0, 255])))
        }
    }

    fn red(frame: &crate::models::EncodedImage) -> u8 {
        image::load_from_memory(&frame.bytes).unwrap().to_rgba8().get_pixel(0, 0)[0]
    }

    #[tokio::test]
    async fn fills_buffer_with_most_recent_frames() {
        let source = Arc::new(CountingSource::new(true));
        let mut sampler = FrameSampler::new(FrameRingBuffer::new(5));
        sampler
            .start(source.clone(), Duration::from_millis(2), ImageEncoding::Png, 92)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        sampler.stop().await.unwrap();

        let frames = sampler.buffer().recent(5);
        assert_eq!(frames.len(), 5);
        let values: Vec<u8> = frames.iter().map(red).collect();
        assert!(values.windows(2).all(|pair| pair[0] < pair[1]), "{values:?}");
        assert!(*values.last().unwrap() >= 4);
        assert!(source.counter.load(Ordering::SeqCst) > *values.last().unwrap());
    }

    #[tokio::test]
    async fn unready_source_leaves_buffer_empty() {
        let source = Arc::new(CountingSource::new(false));
        let mut sampler = FrameSampler::new(FrameRingBuffer::new(5));
        sampler
            .start(source.clone(), Duration::from_millis(2), ImageEncoding::Png, 92)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(sampler.buffer().is_empty());
        assert_eq!(source.counter.load(Ordering::SeqCst), 0);

        source.ready.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        sampler.stop().await.unwrap();
        assert!(!sampler.buffer().is_empty());
    }

    #[tokio::test]
    async fn stop_halts_further_sampling() {
        let source = Arc::new(CountingSource::new(true));
        let mut sampler = FrameSampler::new(FrameRingBuffer::new(5));
        sampler
            .start(source.clone(), Duration::from_millis(2), ImageEncoding::Png, 92)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sampler.stop().await.unwrap();
        assert!(!sampler.is_running());

        let grabbed = source.counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(source.counter.load(Ordering::SeqCst), grabbed);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let source = Arc::new(CountingSource::new(true));
        let mut sampler = FrameSampler::new(FrameRingBuffer::new(5));
        sampler
            .start(source.clone(), Duration::from_millis(5), ImageEncoding::Png, 92)
            .unwrap();
        assert!(sampler
            .start(source, Duration::from_millis(5), ImageEncoding::Png, 92)
            .is_err());
        sampler.stop().await.unwrap();
    }
}
