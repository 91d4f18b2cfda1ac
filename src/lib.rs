//! # Overlay Pyramid
//!
//! Cached tile pyramids for overlay images registered onto a parent image.
//!
//! A user picks three matching points on an overlay and on its parent. This
//! library solves the affine transform those points define, renders the
//! overlay into the parent's pixel space, and stores the result as a grid of
//! 256×256 WebP tiles plus JPEG previews that a deep-zoom viewer can stack
//! on top of the parent.
//!
//! ## Features
//!
//! - **Registration**: exact 3-point affine solve with degeneracy checks
//! - **Resampling**: inverse-mapped bilinear sampling with transparent fill
//! - **Atomic cache**: each run stages its output and publishes it in one rename
//! - **Cache matching**: regenerate only when the matrix actually changed
//!
//! ## Architecture
//!
//! - [`geometry`] - matrix solve, inversion, bounds and control-point checks
//! - [`codec`] - decode, resize, affine resample and encode behind a trait
//! - [`tile`] - tile slicing, previews and progress reporting
//! - [`cache`] - on-disk tile store and in-memory tile cache
//! - [`pyramid`] - the generation pipeline and its async service
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use overlay_pyramid::{compute_affine_matrix, ControlPoint, PyramidService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let matrix = compute_affine_matrix(&[
//!         ControlPoint::new([0.0, 0.0], [1200.0, 800.0]),
//!         ControlPoint::new([4000.0, 0.0], [3200.0, 800.0]),
//!         ControlPoint::new([0.0, 3000.0], [1200.0, 2300.0]),
//!     ])?;
//!
//!     let service = PyramidService::from_config(&ServiceConfig::new(".tile-cache"));
//!     if !service.has_matching_affine_tiles("overlay-01", &matrix).await {
//!         let meta = service
//!             .generate_affine_tiles("overlay.tif", "overlay-01", matrix, None)
//!             .await?;
//!         println!("{} tiles", meta.base.total_tiles);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pyramid;
pub mod tile;

// Re-export commonly used types
pub use cache::{
    derive_image_hash, AffineTileMetadata, BoundsOffset, TileMemoryCache, TileMetadata, TileStore,
};
pub use codec::{Codec, ImageCodec};
pub use config::{Cli, Command};
pub use error::{CacheError, CodecError, GeometryError, PyramidError};
pub use geometry::{
    compute_affine_matrix, compute_transformed_bounds, invert_affine_matrix, AffineMatrix,
    BoundingBox, ControlPoint, Point,
};
pub use pyramid::{AffinePyramidBuilder, PyramidService, ServiceConfig, TileResponse};
pub use tile::{Progress, ProgressCallback, TileCoordinate, TileGrid, TILE_SIZE};
