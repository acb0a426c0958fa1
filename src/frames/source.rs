use anyhow::Result;
use image::RgbaImage;

use crate::error::CaptureError;

/// A live camera feed.
///
/// Implementations may report a zero frame size at any time, including after
/// having produced frames; callers re-check readiness on every attempt.
pub trait VideoSource: Send + Sync {
    /// Opens the device. Called once per session; a failure here blocks every
    /// phase that needs live video.
    fn acquire(&self) -> std::result::Result<(), CaptureError> {
        Ok(())
    }

    /// Current frame dimensions, `(0, 0)` while no decodable frame exists.
    fn frame_size(&self) -> (u32, u32);

    /// Draws the current frame.
    fn grab(&self) -> Result<RgbaImage>;

    fn is_ready(&self) -> bool {
        let (width, height) = self.frame_size();
        width > 0 && height > 0
    }
}
