//! Persisted pyramid metadata.
//!
//! Stored as camelCase JSON in `metadata.json` next to the tiles. Affine
//! metadata flattens the shared fields, so a reader that only knows
//! [`TileMetadata`] can still parse an affine pyramid.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::geometry::{AffineMatrix, BoundingBox};
use crate::tile::{TileGrid, MEDIUM_SIZE, THUMBNAIL_SIZE, TILE_SIZE};

/// Layout version written into every metadata file.
pub const CACHE_VERSION: u32 = 1;

/// Largest per-component difference at which a stored matrix still matches.
pub const MATRIX_MATCH_TOLERANCE: f64 = 1e-6;

/// Fields shared by every tile pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMetadata {
    pub version: u32,
    pub original_path: String,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub total_tiles: u64,
    pub thumbnail_size: u32,
    pub medium_size: u32,
    /// Unix milliseconds
    pub created_at: u64,
}

impl TileMetadata {
    /// Metadata for a `width × height` pyramid created now.
    pub fn for_raster(original_path: &Path, width: u32, height: u32) -> Self {
        let grid = TileGrid::for_size(width, height);
        Self {
            version: CACHE_VERSION,
            original_path: original_path.display().to_string(),
            width,
            height,
            tile_size: TILE_SIZE,
            tiles_x: grid.tiles_x,
            tiles_y: grid.tiles_y,
            total_tiles: grid.total(),
            thumbnail_size: THUMBNAIL_SIZE,
            medium_size: MEDIUM_SIZE,
            created_at: unix_millis(),
        }
    }

    pub fn grid(&self) -> TileGrid {
        TileGrid {
            tiles_x: self.tiles_x,
            tiles_y: self.tiles_y,
        }
    }
}

/// Top-left corner of the transformed overlay in parent coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsOffset {
    pub x: f64,
    pub y: f64,
}

/// Metadata of an affine-registered overlay pyramid.
///
/// `base.width/height` equal `transformed_width/height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineTileMetadata {
    #[serde(flatten)]
    pub base: TileMetadata,
    pub original_width: u32,
    pub original_height: u32,
    pub transformed_width: u32,
    pub transformed_height: u32,
    /// Forward matrix as supplied by the caller
    pub affine_matrix: AffineMatrix,
    pub bounds_offset: BoundsOffset,
}

impl AffineTileMetadata {
    /// Assemble metadata from the measured rasters.
    ///
    /// `transformed` is the size of the resampled raster actually produced,
    /// which is authoritative over the bounding box.
    pub fn new(
        original_path: &Path,
        original: (u32, u32),
        transformed: (u32, u32),
        matrix: AffineMatrix,
        bounds: &BoundingBox,
    ) -> Self {
        Self {
            base: TileMetadata::for_raster(original_path, transformed.0, transformed.1),
            original_width: original.0,
            original_height: original.1,
            transformed_width: transformed.0,
            transformed_height: transformed.1,
            affine_matrix: matrix,
            bounds_offset: BoundsOffset {
                x: bounds.min_x,
                y: bounds.min_y,
            },
        }
    }

    /// Whether this pyramid was generated for `matrix`, within
    /// [`MATRIX_MATCH_TOLERANCE`].
    pub fn matches_matrix(&self, matrix: &AffineMatrix) -> bool {
        self.affine_matrix.approx_eq(matrix, MATRIX_MATCH_TOLERANCE)
    }

    pub fn grid(&self) -> TileGrid {
        self.base.grid()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
