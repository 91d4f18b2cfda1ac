//! Destinations for generated artifacts.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::CacheError;

use super::slicer::TileCoordinate;

/// Receives the encoded outputs of one generation run.
///
/// The on-disk implementation is [`crate::cache::StagedArtifacts`];
/// [`MemorySink`] keeps everything in memory.
pub trait ArtifactSink {
    /// Store the thumbnail JPEG.
    fn save_thumbnail(&mut self, data: &[u8]) -> Result<(), CacheError>;

    /// Store the medium preview JPEG.
    fn save_medium(&mut self, data: &[u8]) -> Result<(), CacheError>;

    /// Store one encoded tile.
    fn save_tile(&mut self, coord: TileCoordinate, data: &[u8]) -> Result<(), CacheError>;
}

/// In-memory [`ArtifactSink`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub thumbnail: Option<Bytes>,
    pub medium: Option<Bytes>,
    pub tiles: HashMap<TileCoordinate, Bytes>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(&self, tile_x: u32, tile_y: u32) -> Option<&Bytes> {
        self.tiles.get(&TileCoordinate::new(tile_x, tile_y))
    }
}

impl ArtifactSink for MemorySink {
    fn save_thumbnail(&mut self, data: &[u8]) -> Result<(), CacheError> {
        self.thumbnail = Some(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn save_medium(&mut self, data: &[u8]) -> Result<(), CacheError> {
        self.medium = Some(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn save_tile(&mut self, coord: TileCoordinate, data: &[u8]) -> Result<(), CacheError> {
        self.tiles.insert(coord, Bytes::copy_from_slice(data));
        Ok(())
    }
}
