//! Fixed-size tile grid over a raw raster.
//!
//! Tiles are always `TILE_SIZE × TILE_SIZE`. Tiles on the right and bottom
//! edges are padded with zero bytes, which in RGBA is fully transparent
//! black.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{Codec, WEBP_QUALITY};
use crate::error::PyramidError;

use super::progress::{tile_progress, Progress};
use super::sink::ArtifactSink;

/// Edge length of every tile, in pixels.
pub const TILE_SIZE: u32 = 256;

// =============================================================================
// Raw raster
// =============================================================================

/// Decoded pixels, row-major, `channels` bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRaster {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl RawRaster {
    /// Wrap a buffer, checking its length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self, PyramidError> {
        if channels == 0 {
            return Err(PyramidError::InvalidInput {
                reason: "raster must have at least one channel".to_string(),
            });
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PyramidError::InvalidInput {
                reason: format!(
                    "raster buffer holds {} bytes, expected {} for {}x{}x{}",
                    data.len(),
                    expected,
                    width,
                    height,
                    channels
                ),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Take ownership of an RGBA image's pixel buffer without copying.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            channels: 4,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Zero-based tile position, `(0, 0)` at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileCoordinate {
    pub tile_x: u32,
    pub tile_y: u32,
}

impl TileCoordinate {
    pub const fn new(tile_x: u32, tile_y: u32) -> Self {
        Self { tile_x, tile_y }
    }

    /// Pixel offset of this tile's top-left corner.
    pub fn pixel_origin(&self) -> (u32, u32) {
        (
            self.tile_x.saturating_mul(TILE_SIZE),
            self.tile_y.saturating_mul(TILE_SIZE),
        )
    }
}

/// Tile counts for a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl TileGrid {
    /// `ceil(width / 256) × ceil(height / 256)`.
    pub fn for_size(width: u32, height: u32) -> Self {
        Self {
            tiles_x: width.div_ceil(TILE_SIZE),
            tiles_y: height.div_ceil(TILE_SIZE),
        }
    }

    /// Widened so that no grid a `u32` raster can produce overflows.
    pub fn total(&self) -> u64 {
        u64::from(self.tiles_x) * u64::from(self.tiles_y)
    }

    /// Row-major: `tile_y` outer, `tile_x` inner.
    pub fn coordinates(&self) -> impl Iterator<Item = TileCoordinate> {
        let tiles_x = self.tiles_x;
        (0..self.tiles_y).flat_map(move |y| (0..tiles_x).map(move |x| TileCoordinate::new(x, y)))
    }

    pub fn contains(&self, coord: TileCoordinate) -> bool {
        coord.tile_x < self.tiles_x && coord.tile_y < self.tiles_y
    }
}

/// Copy one tile out of `raster` into a zeroed `TILE_SIZE²` buffer.
///
/// Rows are clipped at the raster's right and bottom edges; everything
/// outside stays zero. Coordinates past the grid yield an all-zero tile.
pub fn extract_tile(raster: &RawRaster, coord: TileCoordinate) -> Vec<u8> {
    let channels = raster.channels as usize;
    let tile_stride = TILE_SIZE as usize * channels;
    let mut tile = vec![0u8; tile_stride * TILE_SIZE as usize];

    let (x, y) = coord.pixel_origin();
    if x >= raster.width || y >= raster.height {
        return tile;
    }
    let tile_width = TILE_SIZE.min(raster.width - x) as usize;
    let tile_height = TILE_SIZE.min(raster.height - y) as usize;

    let stride = raster.stride();
    let row_bytes = tile_width * channels;
    for row in 0..tile_height {
        let src_start = (y as usize + row) * stride + x as usize * channels;
        let dst_start = row * tile_stride;
        tile[dst_start..dst_start + row_bytes]
            .copy_from_slice(&raster.data[src_start..src_start + row_bytes]);
    }

    tile
}

// =============================================================================
// Slicer
// =============================================================================

/// Cuts a raster into encoded tiles.
pub struct TileSlicer<'a, C: Codec + ?Sized> {
    codec: &'a C,
}

impl<'a, C: Codec + ?Sized> TileSlicer<'a, C> {
    /// Slicer encoding WebP at the tile quality (90).
    pub fn new(codec: &'a C) -> Self {
        Self { codec }
    }

    /// Encode every tile of `raster` into `sink`, row by row.
    ///
    /// Progress advances from 35 to 95 as tiles complete. The first encode
    /// or sink failure aborts the run; tiles already handed to the sink are
    /// left there.
    pub fn slice(
        &self,
        raster: &RawRaster,
        sink: &mut dyn ArtifactSink,
        progress: &mut Progress,
    ) -> Result<TileGrid, PyramidError> {
        let grid = TileGrid::for_size(raster.width, raster.height);
        let total = grid.total();
        debug!(
            width = raster.width,
            height = raster.height,
            tiles_x = grid.tiles_x,
            tiles_y = grid.tiles_y,
            "slicing tiles"
        );

        for (done, coord) in grid.coordinates().enumerate() {
            let pixels = extract_tile(raster, coord);
            let encoded = self
                .codec
                .encode_webp(&pixels, TILE_SIZE, TILE_SIZE, raster.channels, WEBP_QUALITY)
                .map_err(|e| PyramidError::Encode {
                    artifact: format!("tile ({}, {})", coord.tile_x, coord.tile_y),
                    message: e.to_string(),
                })?;
            sink.save_tile(coord, &encoded)?;
            progress.report(tile_progress(done as u64 + 1, total));
        }

        Ok(grid)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use crate::tile::MemorySink;

    /// Every pixel encodes its own coordinates so misplaced copies show up.
    fn coded_raster(width: u32, height: u32) -> RawRaster {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 251) as u8, (y % 251) as u8, (x / 251) as u8, 255]);
            }
        }
        RawRaster::new(data, width, height, 4).unwrap()
    }

    fn reassemble(raster: &RawRaster) -> Vec<u8> {
        let grid = TileGrid::for_size(raster.width(), raster.height());
        let channels = raster.channels() as usize;
        let mut out = vec![0u8; raster.as_bytes().len()];
        let stride = raster.width() as usize * channels;

        for coord in grid.coordinates() {
            let tile = extract_tile(raster, coord);
            let (ox, oy) = coord.pixel_origin();
            for ty in 0..TILE_SIZE {
                for tx in 0..TILE_SIZE {
                    let (x, y) = (ox + tx, oy + ty);
                    let src = (ty * TILE_SIZE + tx) as usize * channels;
                    if x >= raster.width() || y >= raster.height() {
                        assert!(tile[src..src + channels].iter().all(|&b| b == 0));
                        continue;
                    }
                    let dst = y as usize * stride + x as usize * channels;
                    assert!(out[dst..dst + channels].iter().all(|&b| b == 0), "overlap");
                    out[dst..dst + channels].copy_from_slice(&tile[src..src + channels]);
                }
            }
        }
        out
    }

    #[test]
    fn test_grid_counts() {
        assert_eq!(TileGrid::for_size(256, 256), TileGrid { tiles_x: 1, tiles_y: 1 });
        assert_eq!(TileGrid::for_size(257, 1), TileGrid { tiles_x: 2, tiles_y: 1 });
        assert_eq!(TileGrid::for_size(2000, 2).total(), 8);
        assert_eq!(TileGrid::for_size(1, 1).total(), 1);
        assert_eq!(
            TileGrid::for_size(u32::MAX, u32::MAX).total(),
            16_777_216 * 16_777_216
        );
    }

    #[test]
    fn test_coordinates_row_major() {
        let coords: Vec<_> = TileGrid { tiles_x: 2, tiles_y: 2 }.coordinates().collect();
        assert_eq!(
            coords,
            vec![
                TileCoordinate::new(0, 0),
                TileCoordinate::new(1, 0),
                TileCoordinate::new(0, 1),
                TileCoordinate::new(1, 1),
            ]
        );
    }

    #[test]
    fn test_tiles_reconstruct_raster() {
        for (w, h) in [(1, 1), (256, 256), (300, 517), (600, 40)] {
            let raster = coded_raster(w, h);
            assert_eq!(reassemble(&raster), raster.as_bytes(), "{}x{}", w, h);
        }
    }

    #[test]
    fn test_edge_tile_padding_is_transparent() {
        let raster = coded_raster(300, 10);
        let tile = extract_tile(&raster, TileCoordinate::new(1, 0));
        assert_eq!(tile.len(), (TILE_SIZE * TILE_SIZE * 4) as usize);

        // Column 43 (x = 299) is the last real pixel
        assert_eq!(&tile[43 * 4..44 * 4], &[(299 % 251) as u8, 0, 1, 255]);
        assert_eq!(&tile[44 * 4..45 * 4], &[0, 0, 0, 0]);
        let row_10 = 10 * TILE_SIZE as usize * 4;
        assert!(tile[row_10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_extract_outside_grid_is_empty() {
        let raster = coded_raster(10, 10);
        assert!(extract_tile(&raster, TileCoordinate::new(3, 0)).iter().all(|&b| b == 0));
        assert!(extract_tile(&raster, TileCoordinate::new(u32::MAX, u32::MAX))
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_raw_raster_length_check() {
        assert!(RawRaster::new(vec![0; 11], 2, 2, 3).is_err());
        assert!(RawRaster::new(vec![0; 12], 2, 2, 3).is_ok());
        assert!(RawRaster::new(vec![], 0, 0, 0).is_err());
    }

    #[test]
    fn test_slice_into_memory() {
        let codec = ImageCodec::new();
        let raster = coded_raster(300, 260);
        let mut sink = MemorySink::new();
        let mut progress = Progress::silent();

        let grid = TileSlicer::new(&codec)
            .slice(&raster, &mut sink, &mut progress)
            .unwrap();

        assert_eq!(grid, TileGrid { tiles_x: 2, tiles_y: 2 });
        assert_eq!(sink.tiles.len(), 4);
        assert_eq!(progress.last(), Some(95));

        let tile = image::load_from_memory(sink.tile(1, 1).unwrap()).unwrap();
        assert_eq!((tile.width(), tile.height()), (TILE_SIZE, TILE_SIZE));
    }
}
