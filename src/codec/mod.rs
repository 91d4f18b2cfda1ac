//! Raster codec capability.
//!
//! The pyramid builder never touches image formats directly. It goes through
//! the [`Codec`] trait, which covers decoding a source file, resizing for
//! previews, the affine resample and the two output encodings.
//! [`ImageCodec`] implements it with the `image` and `webp` crates; tests
//! swap in failing codecs to exercise error paths.

mod encoder;
mod resample;

use std::path::Path;

use bytes::Bytes;
use image::{ImageReader, RgbaImage};

use crate::error::CodecError;

pub use encoder::{
    clamp_quality, encode_jpeg, encode_webp, is_valid_quality, JPEG_QUALITY, MAX_QUALITY,
    MIN_QUALITY, WEBP_QUALITY,
};
pub use resample::{affine_resample, fit_inside, resize_inside, ResampleParams};

// =============================================================================
// Codec Trait
// =============================================================================

/// Decode, resample and encode rasters, all with alpha support.
///
/// Implementations must be usable from a blocking worker thread.
pub trait Codec: Send + Sync {
    /// Decode the file at `path` into 8-bit RGBA.
    fn decode(&self, path: &Path) -> Result<RgbaImage, CodecError>;

    /// Resize to fit inside a `size × size` box without enlarging.
    fn resize_inside(&self, image: &RgbaImage, size: u32) -> Result<RgbaImage, CodecError>;

    /// Produce a `width × height` raster sampling `image` through `params`.
    fn affine_resample(
        &self,
        image: &RgbaImage,
        params: &ResampleParams,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, CodecError>;

    /// Encode a preview as JPEG.
    fn encode_jpeg(&self, image: &RgbaImage, quality: u8) -> Result<Bytes, CodecError>;

    /// Encode a raw tile buffer as WebP.
    fn encode_webp(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        quality: u8,
    ) -> Result<Bytes, CodecError>;
}

// =============================================================================
// ImageCodec
// =============================================================================

/// [`Codec`] backed by the `image` crate, with libwebp for tile encoding.
///
/// Decoding lifts the `image` crate's allocation limits so that large
/// whole-slide overlays load.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn decode(&self, path: &Path) -> Result<RgbaImage, CodecError> {
        let mut reader = ImageReader::open(path)
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        reader.no_limits();

        let image = reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(image.into_rgba8())
    }

    fn resize_inside(&self, image: &RgbaImage, size: u32) -> Result<RgbaImage, CodecError> {
        Ok(resize_inside(image, size))
    }

    fn affine_resample(
        &self,
        image: &RgbaImage,
        params: &ResampleParams,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, CodecError> {
        affine_resample(image, params, width, height)
    }

    fn encode_jpeg(&self, image: &RgbaImage, quality: u8) -> Result<Bytes, CodecError> {
        encode_jpeg(image, quality)
    }

    fn encode_webp(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        quality: u8,
    ) -> Result<Bytes, CodecError> {
        encode_webp(pixels, width, height, channels, quality)
    }
}
