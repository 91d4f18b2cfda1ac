//! Tile cache: durable pyramid storage plus an in-memory read cache.
//!
//! # Components
//!
//! - [`TileStore`]: per-hash directories on disk with staged publishing
//! - [`StagedArtifacts`]: the private output area of one generation run
//! - [`AffineTileMetadata`] / [`TileMetadata`]: the committed description of a pyramid
//! - [`TileMemoryCache`]: size-bounded LRU of encoded tiles for readers
//! - [`derive_image_hash`]: default cache key for a source file

mod hash;
mod memory;
mod metadata;
mod store;

pub use hash::derive_image_hash;
pub use memory::{TileCacheKey, TileMemoryCache, DEFAULT_MEMORY_CACHE_CAPACITY};
pub use metadata::{
    AffineTileMetadata, BoundsOffset, TileMetadata, CACHE_VERSION, MATRIX_MATCH_TOLERANCE,
};
pub use store::{
    validate_hash, StagedArtifacts, TileStore, MEDIUM_FILE, METADATA_FILE, STALE_STAGING_AGE,
    THUMBNAIL_FILE,
};
