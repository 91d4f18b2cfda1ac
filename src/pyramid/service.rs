//! Async facade over the pyramid builder and the tile cache.
//!
//! The PyramidService is the entry point for async callers. It:
//! - runs generation on the blocking pool
//! - answers cache-match checks
//! - serves committed tiles through the memory cache
//! - deletes pyramids and evicts their cached tiles
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PyramidService                           │
//! │                                                                 │
//! │   generate_affine_tiles ──spawn_blocking──▶ AffinePyramidBuilder│
//! │   affine_tile ──▶ TileMemoryCache ──miss──▶ TileStore           │
//! │   delete_affine_tiles ──▶ TileStore + invalidate_hash           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::cache::{
    AffineTileMetadata, TileCacheKey, TileMemoryCache, TileStore, DEFAULT_MEMORY_CACHE_CAPACITY,
};
use crate::codec::{Codec, ImageCodec};
use crate::error::PyramidError;
use crate::geometry::AffineMatrix;
use crate::tile::{Progress, ProgressCallback, TileCoordinate};

use super::builder::AffinePyramidBuilder;

// =============================================================================
// Service Configuration
// =============================================================================

/// Settings for [`PyramidService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory of the tile cache
    pub cache_dir: PathBuf,

    /// Byte capacity of the in-memory tile cache
    pub memory_cache_capacity: usize,
}

impl ServiceConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            memory_cache_capacity: DEFAULT_MEMORY_CACHE_CAPACITY,
        }
    }

    pub fn with_memory_cache_capacity(mut self, capacity: usize) -> Self {
        self.memory_cache_capacity = capacity;
        self
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// A committed tile served by the service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded WebP tile
    pub data: Bytes,

    /// Whether this tile was served from the memory cache
    pub cache_hit: bool,
}

// =============================================================================
// Pyramid Service
// =============================================================================

/// Service for generating and serving affine pyramids.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```no_run
/// use overlay_pyramid::geometry::AffineMatrix;
/// use overlay_pyramid::pyramid::{PyramidService, ServiceConfig};
///
/// # async fn run() -> Result<(), overlay_pyramid::PyramidError> {
/// let service = PyramidService::from_config(&ServiceConfig::new("/var/cache/tiles"));
/// let matrix = AffineMatrix::new(0.5, 0.0, 1200.0, 0.0, 0.5, 800.0);
///
/// if !service.has_matching_affine_tiles("overlay-01", &matrix).await {
///     service
///         .generate_affine_tiles("overlay.tif", "overlay-01", matrix, None)
///         .await?;
/// }
/// let tile = service.affine_tile("overlay-01", 0, 0).await?;
/// # Ok(())
/// # }
/// ```
pub struct PyramidService<C: Codec + 'static = ImageCodec> {
    builder: Arc<AffinePyramidBuilder<C>>,

    /// Shared with the builder; reads bypass it
    store: Arc<TileStore>,

    memory: TileMemoryCache,
}

impl PyramidService<ImageCodec> {
    /// Service with the default codec and memory cache capacity.
    pub fn new(store: TileStore) -> Self {
        Self::with_codec(store, ImageCodec::new(), DEFAULT_MEMORY_CACHE_CAPACITY)
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::with_codec(
            TileStore::new(&config.cache_dir),
            ImageCodec::new(),
            config.memory_cache_capacity,
        )
    }
}

impl<C: Codec + 'static> PyramidService<C> {
    pub fn with_codec(store: TileStore, codec: C, memory_cache_capacity: usize) -> Self {
        Self {
            builder: Arc::new(AffinePyramidBuilder::with_codec(store.clone(), codec)),
            store: Arc::new(store),
            memory: TileMemoryCache::with_capacity(memory_cache_capacity),
        }
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Generate the affine pyramid for `source` under `hash`.
    ///
    /// Runs the builder on the blocking pool. `on_progress` is invoked from
    /// that thread. Always regenerates; pair with
    /// [`has_matching_affine_tiles`](Self::has_matching_affine_tiles) to skip
    /// up-to-date pyramids.
    pub async fn generate_affine_tiles(
        &self,
        source: impl Into<PathBuf>,
        hash: &str,
        matrix: AffineMatrix,
        on_progress: Option<ProgressCallback>,
    ) -> Result<AffineTileMetadata, PyramidError> {
        let builder = Arc::clone(&self.builder);
        let source = source.into();
        let owned_hash = hash.to_string();

        let metadata = run_blocking(move || {
            let mut progress = Progress::new(on_progress);
            builder.generate(&source, &owned_hash, &matrix, &mut progress)
        })
        .await??;

        let evicted = self.memory.invalidate_hash(hash).await;
        debug!(hash, evicted, "evicted stale tiles after regeneration");
        Ok(metadata)
    }

    /// Whether the committed pyramid for `hash` was built from `matrix`.
    pub async fn has_matching_affine_tiles(&self, hash: &str, matrix: &AffineMatrix) -> bool {
        let store = Arc::clone(&self.store);
        let hash = hash.to_string();
        let matrix = *matrix;

        run_blocking(move || store.has_matching_affine_tiles(&hash, &matrix))
            .await
            .unwrap_or(false)
    }

    /// Committed metadata for `hash`, if any.
    pub async fn affine_metadata(
        &self,
        hash: &str,
    ) -> Result<Option<AffineTileMetadata>, PyramidError> {
        let store = Arc::clone(&self.store);
        let hash = hash.to_string();

        Ok(run_blocking(move || store.load_affine_metadata(&hash)).await??)
    }

    /// Remove the pyramid for `hash`. Returns `false` if none existed.
    pub async fn delete_affine_tiles(&self, hash: &str) -> Result<bool, PyramidError> {
        let store = Arc::clone(&self.store);
        let owned_hash = hash.to_string();

        let deleted = run_blocking(move || store.delete_affine_tiles(&owned_hash)).await??;
        self.memory.invalidate_hash(hash).await;
        Ok(deleted)
    }

    /// Fetch one committed tile, using the memory cache when possible.
    ///
    /// Returns `Ok(None)` for coordinates outside the committed grid or when
    /// nothing is committed for `hash`.
    pub async fn affine_tile(
        &self,
        hash: &str,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Option<TileResponse>, PyramidError> {
        let key = TileCacheKey::new(hash, tile_x, tile_y);
        if let Some(data) = self.memory.get(&key).await {
            return Ok(Some(TileResponse {
                data,
                cache_hit: true,
            }));
        }

        // Captured before the read so a concurrent delete or commit wins
        let epoch = self.memory.epoch(hash).await;

        let store = Arc::clone(&self.store);
        let owned_hash = hash.to_string();
        let coord = TileCoordinate::new(tile_x, tile_y);
        let loaded = run_blocking(move || store.load_affine_tile(&owned_hash, coord)).await??;

        let Some(data) = loaded else {
            return Ok(None);
        };
        if !self.memory.put_if_current(key, data.clone(), epoch).await {
            debug!(hash, tile_x, tile_y, "tile invalidated while loading, not cached");
        }
        Ok(Some(TileResponse {
            data,
            cache_hit: false,
        }))
    }

    /// Memory cache statistics.
    ///
    /// Returns `(current_size, capacity, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        let size = self.memory.size().await;
        let capacity = self.memory.capacity();
        let count = self.memory.len().await;
        (size, capacity, count)
    }

    /// Clear the memory cache. Committed pyramids are untouched.
    pub async fn clear_cache(&self) {
        self.memory.clear().await;
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PyramidError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PyramidError::Worker {
            message: e.to_string(),
        })
}

// =============================================================================
// Tests
// =============================================================================
