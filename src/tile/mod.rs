//! Tiling and preview primitives.
//!
//! This module turns a finished raster into the artifacts a viewer reads:
//! a grid of fixed-size WebP tiles plus two JPEG previews.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │   resampled raster   │
//!                 └──────────┬───────────┘
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!     ┌──────────────────┐      ┌──────────────────┐
//!     │  PreviewBuilder  │      │   TileSlicer     │
//!     │ thumbnail 512px  │      │ 256×256 WebP q90 │
//!     │ medium 2048px    │      │ zero-padded      │
//!     │ JPEG q85         │      │ edges            │
//!     └────────┬─────────┘      └────────┬─────────┘
//!              └────────────┬────────────┘
//!                           ▼
//!                 ┌──────────────────┐
//!                 │   ArtifactSink   │
//!                 └──────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileSlicer`]: cuts a [`RawRaster`] into a [`TileGrid`] of encoded tiles
//! - [`PreviewBuilder`]: thumbnail and medium preview
//! - [`ArtifactSink`]: where encoded outputs go ([`MemorySink`] or the cache's staging area)
//! - [`Progress`]: monotonic percentage reporting

mod preview;
mod progress;
mod sink;
mod slicer;

pub use preview::{PreviewBuilder, PreviewSizes, MEDIUM_SIZE, THUMBNAIL_SIZE};
pub use progress::{
    tile_progress, Progress, ProgressCallback, PROGRESS_DECODED, PROGRESS_DONE, PROGRESS_MEDIUM,
    PROGRESS_RESAMPLED, PROGRESS_THUMBNAIL, PROGRESS_TILES_SPAN, PROGRESS_TILES_START,
};
pub use sink::{ArtifactSink, MemorySink};
pub use slicer::{extract_tile, RawRaster, TileCoordinate, TileGrid, TileSlicer, TILE_SIZE};
