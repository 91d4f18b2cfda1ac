//! Untiled preview images.

use image::RgbaImage;
use tracing::debug;

use crate::codec::{Codec, JPEG_QUALITY};
use crate::error::PyramidError;

use super::progress::{Progress, PROGRESS_MEDIUM, PROGRESS_THUMBNAIL};
use super::sink::ArtifactSink;

/// Longest edge of the thumbnail.
pub const THUMBNAIL_SIZE: u32 = 512;

/// Longest edge of the medium-resolution preview.
pub const MEDIUM_SIZE: u32 = 2048;

/// Dimensions of the previews that were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSizes {
    pub thumbnail: (u32, u32),
    pub medium: (u32, u32),
}

/// Builds the thumbnail and medium preview from one raster.
pub struct PreviewBuilder<'a, C: Codec + ?Sized> {
    codec: &'a C,
}

impl<'a, C: Codec + ?Sized> PreviewBuilder<'a, C> {
    /// Builder encoding JPEG at the preview quality (85).
    pub fn new(codec: &'a C) -> Self {
        Self { codec }
    }

    /// Write the thumbnail, then the medium preview, into `sink`.
    pub fn build(
        &self,
        image: &RgbaImage,
        sink: &mut dyn ArtifactSink,
        progress: &mut Progress,
    ) -> Result<PreviewSizes, PyramidError> {
        let thumbnail = self.render(image, THUMBNAIL_SIZE, "thumbnail")?;
        sink.save_thumbnail(&thumbnail.1)?;
        progress.report(PROGRESS_THUMBNAIL);

        let medium = self.render(image, MEDIUM_SIZE, "medium preview")?;
        sink.save_medium(&medium.1)?;
        progress.report(PROGRESS_MEDIUM);

        debug!(thumbnail = ?thumbnail.0, medium = ?medium.0, "previews written");
        Ok(PreviewSizes {
            thumbnail: thumbnail.0,
            medium: medium.0,
        })
    }

    fn render(
        &self,
        image: &RgbaImage,
        size: u32,
        artifact: &str,
    ) -> Result<((u32, u32), bytes::Bytes), PyramidError> {
        let encode_error = |message: String| PyramidError::Encode {
            artifact: artifact.to_string(),
            message,
        };

        let resized = self
            .codec
            .resize_inside(image, size)
            .map_err(|e| encode_error(e.to_string()))?;
        let encoded = self
            .codec
            .encode_jpeg(&resized, JPEG_QUALITY)
            .map_err(|e| encode_error(e.to_string()))?;

        Ok((resized.dimensions(), encoded))
    }
}
