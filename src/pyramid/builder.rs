//! Affine pyramid builder.
//!
//! Generates the cached tile pyramid of an overlay registered onto a parent
//! image. The pipeline is strictly linear:
//!
//! ```text
//!  decode ─▶ forward bounds ─▶ inverse ─▶ resample offset ─▶ resample
//!     ─▶ measure ─▶ previews ─▶ flatten ─▶ tiles ─▶ commit metadata
//! ```
//!
//! Everything lands in a staging directory first; the final commit is the
//! only step that makes the pyramid visible.

use std::path::Path;

use tracing::{debug, info, info_span};

use crate::cache::{validate_hash, AffineTileMetadata, TileStore};
use crate::codec::{Codec, ImageCodec, ResampleParams};
use crate::error::PyramidError;
use crate::geometry::{compute_transformed_bounds, invert_affine_matrix, AffineMatrix};
use crate::tile::{
    PreviewBuilder, Progress, RawRaster, TileSlicer, PROGRESS_DECODED, PROGRESS_RESAMPLED,
    PROGRESS_TILES_START,
};

/// Builds affine tile pyramids into a [`TileStore`].
///
/// The builder is synchronous and CPU-bound; run it on a blocking thread.
/// [`crate::pyramid::PyramidService`] does that for async callers.
///
/// # Example
///
/// ```no_run
/// use overlay_pyramid::cache::TileStore;
/// use overlay_pyramid::geometry::AffineMatrix;
/// use overlay_pyramid::pyramid::AffinePyramidBuilder;
/// use overlay_pyramid::tile::Progress;
///
/// let builder = AffinePyramidBuilder::new(TileStore::new("/var/cache/tiles"));
/// let matrix = AffineMatrix::new(0.5, 0.0, 1200.0, 0.0, 0.5, 800.0);
/// let mut progress = Progress::new(Some(Box::new(|p| println!("{}%", p))));
///
/// let meta = builder
///     .generate("overlay.tif".as_ref(), "overlay-01", &matrix, &mut progress)
///     .unwrap();
/// println!("{} tiles", meta.base.total_tiles);
/// ```
#[derive(Debug, Clone)]
pub struct AffinePyramidBuilder<C: Codec = ImageCodec> {
    store: TileStore,
    codec: C,
}

impl AffinePyramidBuilder<ImageCodec> {
    /// Builder using the default `image`-backed codec.
    pub fn new(store: TileStore) -> Self {
        Self::with_codec(store, ImageCodec::new())
    }
}

impl<C: Codec> AffinePyramidBuilder<C> {
    pub fn with_codec(store: TileStore, codec: C) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Generate the pyramid of `source` under `hash` for the forward
    /// `matrix` (overlay to parent).
    ///
    /// Always regenerates; check
    /// [`TileStore::has_matching_affine_tiles`] first to skip work.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run and discards its staging directory. A
    /// previously committed pyramid for `hash` stays in place.
    pub fn generate(
        &self,
        source: &Path,
        hash: &str,
        matrix: &AffineMatrix,
        progress: &mut Progress,
    ) -> Result<AffineTileMetadata, PyramidError> {
        validate_hash(hash).map_err(|e| PyramidError::InvalidInput {
            reason: e.to_string(),
        })?;
        if !matrix.is_finite() {
            return Err(PyramidError::InvalidInput {
                reason: format!("affine matrix has non-finite components: {:?}", matrix.to_array()),
            });
        }

        let _span = info_span!("affine_pyramid", hash).entered();
        info!(source = %source.display(), matrix = ?matrix.to_array(), "generating affine tiles");

        // Load source
        let original = self
            .codec
            .decode(source)
            .map_err(|e| PyramidError::Decode {
                path: source.display().to_string(),
                message: e.to_string(),
            })?;
        let (src_width, src_height) = original.dimensions();
        progress.report(PROGRESS_DECODED);

        // Placement in parent space
        let bounds = compute_transformed_bounds(src_width, src_height, matrix);
        let (out_width, out_height) = bounds.raster_size();
        debug!(
            src_width,
            src_height,
            min_x = bounds.min_x,
            min_y = bounds.min_y,
            out_width,
            out_height,
            "computed transformed bounds"
        );

        // Output pixels sample input pixels, so resampling runs on the inverse
        let inverse = invert_affine_matrix(matrix)?;
        let params = ResampleParams::for_bounds(&inverse, &bounds);

        let transformed = self
            .codec
            .affine_resample(&original, &params, out_width, out_height)
            .map_err(|e| PyramidError::Transform {
                message: e.to_string(),
            })?;
        drop(original);
        progress.report(PROGRESS_RESAMPLED);

        // The produced raster is authoritative from here on
        let (width, height) = transformed.dimensions();
        if (width, height) != (out_width, out_height) {
            debug!(
                expected = ?(out_width, out_height),
                actual = ?(width, height),
                "resampled raster differs from computed bounds"
            );
        }

        let mut staged = self.store.stage_affine(hash)?;

        PreviewBuilder::new(&self.codec).build(&transformed, &mut staged, progress)?;

        // Moves the pixel buffer; the image no longer exists after this
        let raster = RawRaster::from_rgba(transformed);
        progress.report(PROGRESS_TILES_START);

        let grid = TileSlicer::new(&self.codec).slice(&raster, &mut staged, progress)?;
        drop(raster);

        let metadata = AffineTileMetadata::new(
            source,
            (src_width, src_height),
            (width, height),
            *matrix,
            &bounds,
        );
        staged.commit(&metadata)?;
        progress.finish();

        info!(
            width,
            height,
            tiles = grid.total(),
            "affine tiles ready"
        );
        Ok(metadata)
    }
}

// =============================================================================
// Tests
// =============================================================================
