use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::ImageEncoding;

use super::{encode::encode_frame, FrameRingBuffer, VideoSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Continuously samples `source` into `buffer` until `cancel_token` fires.
pub async fn sampling_loop(
    source: Arc<dyn VideoSource>,
    buffer: FrameRingBuffer,
    interval: Duration,
    encoding: ImageEncoding,
    jpeg_quality: u8,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut encoded: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!(
                    "sampling loop shutting down ({} frames encoded, {} ticks skipped)",
                    encoded,
                    skipped
                );
                break;
            }
            _ = ticker.tick() => {
                if !source.is_ready() {
                    skipped += 1;
                    continue;
                }

                match sample_once(Arc::clone(&source), encoding, jpeg_quality).await {
                    // A frame that lands after cancellation belongs to no one.
                    Ok(_) if cancel_token.is_cancelled() => break,
                    Ok(frame) if frame.is_valid() => {
                        buffer.push(frame);
                        encoded += 1;
                    }
                    Ok(_) => skipped += 1,
                    Err(err) => {
                        skipped += 1;
                        log_debug!("frame dropped: {err:#}");
                    }
                }
            }
        }
    }
}

async fn sample_once(
    source: Arc<dyn VideoSource>,
    encoding: ImageEncoding,
    jpeg_quality: u8,
) -> Result<crate::models::EncodedImage> {
    tokio::task::spawn_blocking(move || {
        let frame = source.grab()?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("source produced an empty frame"));
        }
        encode_frame(&frame, encoding, jpeg_quality)
    })
    .await
    .context("frame encoding worker join failed")?
}
