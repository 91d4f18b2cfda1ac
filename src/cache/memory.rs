//! In-memory cache of encoded tiles read from disk.
//!
//! Sits in front of [`TileStore`](super::TileStore) so that a viewer panning
//! over the same region does not hit the filesystem for every tile.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.
//!
//! # Invalidation
//!
//! Each hash carries an epoch that [`TileMemoryCache::invalidate_hash`]
//! bumps. A reader that loads a tile from disk captures the epoch first and
//! inserts with [`TileMemoryCache::put_if_current`], so a tile read before a
//! delete or regeneration cannot be cached after it.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::tile::TileCoordinate;

/// Default cache capacity: 64MB
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Identifies one tile of one affine pyramid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Image hash the pyramid belongs to
    pub hash: Arc<str>,

    pub coord: TileCoordinate,
}

impl TileCacheKey {
    pub fn new(hash: impl Into<Arc<str>>, tile_x: u32, tile_y: u32) -> Self {
        Self {
            hash: hash.into(),
            coord: TileCoordinate::new(tile_x, tile_y),
        }
    }
}

// =============================================================================
// Tile Memory Cache
// =============================================================================

/// LRU cache for encoded tiles with size-based capacity.
///
/// Safe to share across tasks via `Arc`.
pub struct TileMemoryCache {
    cache: RwLock<LruCache<TileCacheKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,

    /// Invalidation count per hash; absent means zero
    epochs: RwLock<HashMap<Arc<str>, u64>>,
}

impl TileMemoryCache {
    /// Create a cache with default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes of tiles.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a byte capacity and an entry limit.
    ///
    /// An entry limit of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
            epochs: RwLock::new(HashMap::new()),
        }
    }

    /// Get a tile, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a tile without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile, evicting least-recently-used entries past capacity.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        self.insert(&mut cache, &mut current_size, key, data);
    }

    /// Current invalidation epoch of `hash`.
    pub async fn epoch(&self, hash: &str) -> u64 {
        self.epochs.read().await.get(hash).copied().unwrap_or(0)
    }

    /// Store a tile only if `hash` has not been invalidated since `epoch`
    /// was read. Returns whether the tile was stored.
    pub async fn put_if_current(&self, key: TileCacheKey, data: Bytes, epoch: u64) -> bool {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let current = self.epochs.read().await.get(&*key.hash).copied().unwrap_or(0);
        if current != epoch {
            return false;
        }
        self.insert(&mut cache, &mut current_size, key, data);
        true
    }

    fn insert(
        &self,
        cache: &mut LruCache<TileCacheKey, Bytes>,
        current_size: &mut usize,
        key: TileCacheKey,
        data: Bytes,
    ) {
        let data_size = data.len();

        // Returns the replaced value, or an unrelated tile pushed out by the
        // entry limit
        if let Some((_, evicted)) = cache.push(key, data) {
            *current_size = current_size.saturating_sub(evicted.len());
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((_, evicted_data)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }
    }

    /// Remove one tile.
    pub async fn remove(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let data = cache.pop(key)?;
        *current_size = current_size.saturating_sub(data.len());
        Some(data)
    }

    /// Drop every tile belonging to `hash` and bump its epoch. Returns how
    /// many tiles were removed.
    ///
    /// Linear in the number of cached tiles.
    pub async fn invalidate_hash(&self, hash: &str) -> usize {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        *self.epochs.write().await.entry(Arc::from(hash)).or_insert(0) += 1;

        let doomed: Vec<TileCacheKey> = cache
            .iter()
            .filter(|(key, _)| &*key.hash == hash)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            if let Some(data) = cache.pop(key) {
                *current_size = current_size.saturating_sub(data.len());
            }
        }
        doomed.len()
    }

    /// Clear all entries.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
