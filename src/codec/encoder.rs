//! JPEG preview and WebP tile encoders.
//!
//! # Design Decisions
//!
//! - **Previews drop alpha**: JPEG has no alpha channel. Transparent regions
//!   of a resampled overlay are already black (`[0, 0, 0, 0]`), so the alpha
//!   byte is simply discarded.
//!
//! - **Tiles keep alpha**: tiles are encoded as lossy WebP with an alpha
//!   plane so the viewer can composite them over the parent image.
//!
//! - **Quality control**: quality is clamped to 1-100 for both formats.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};

use crate::error::CodecError;

/// JPEG quality for thumbnail and medium previews.
pub const JPEG_QUALITY: u8 = 85;

/// WebP quality for pyramid tiles.
pub const WEBP_QUALITY: u8 = 90;

/// Minimum allowed encoder quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed encoder quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// JPEG
// =============================================================================

/// Encode an RGBA raster as JPEG, discarding alpha.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Bytes, CodecError> {
    let quality = clamp_quality(quality);

    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Rgb([r, g, b])
    });

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .encode_image(&rgb)
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    Ok(Bytes::from(output))
}

// =============================================================================
// WebP
// =============================================================================

/// Encode a raw RGB or RGBA buffer as lossy WebP.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if `channels` is not 3 or 4, if the buffer
/// length does not match `width × height × channels`, or if libwebp fails.
pub fn encode_webp(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    quality: u8,
) -> Result<Bytes, CodecError> {
    let expected = width as usize * height as usize * channels as usize;
    if pixels.len() != expected {
        return Err(CodecError::Encode(format!(
            "buffer holds {} bytes, expected {} for {}x{}x{}",
            pixels.len(),
            expected,
            width,
            height,
            channels
        )));
    }

    let encoder = match channels {
        4 => webp::Encoder::from_rgba(pixels, width, height),
        3 => webp::Encoder::from_rgb(pixels, width, height),
        other => {
            return Err(CodecError::Encode(format!(
                "unsupported channel count {} (expected 3 or 4)",
                other
            )))
        }
    };

    let memory = encoder
        .encode_simple(false, f32::from(clamp_quality(quality)))
        .map_err(|e| CodecError::Encode(format!("libwebp: {:?}", e)))?;

    Ok(Bytes::copy_from_slice(&memory))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate an encoder quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
