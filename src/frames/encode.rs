use std::io::Cursor;

use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};

use crate::error::CaptureError;
use crate::models::{EncodedImage, ImageEncoding};

use super::VideoSource;

/// Compresses an RGBA frame into a still image.
pub fn encode_frame(
    frame: &RgbaImage,
    encoding: ImageEncoding,
    jpeg_quality: u8,
) -> Result<EncodedImage> {
    let (width, height) = frame.dimensions();
    let mut bytes = Vec::new();

    match encoding {
        ImageEncoding::Png => {
            DynamicImage::ImageRgba8(frame.clone())
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .context("png encoding failed")?;
        }
        ImageEncoding::Jpeg => {
            // JPEG carries no alpha channel.
            let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100))
                .encode_image(&rgb)
                .context("jpeg encoding failed")?;
        }
    }

    Ok(EncodedImage::new(bytes, encoding, width, height))
}

/// Synchronous on-demand capture of the source's current frame.
pub fn snapshot(
    source: &dyn VideoSource,
    encoding: ImageEncoding,
    jpeg_quality: u8,
) -> std::result::Result<EncodedImage, CaptureError> {
    if !source.is_ready() {
        return Err(CaptureError::SourceNotReady);
    }

    let frame = source
        .grab()
        .map_err(|err| CaptureError::Encode(format!("{err:#}")))?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::SourceNotReady);
    }

    encode_frame(&frame, encoding, jpeg_quality)
        .map_err(|err| CaptureError::Encode(format!("{err:#}")))
}
