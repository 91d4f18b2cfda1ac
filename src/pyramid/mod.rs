//! Affine pyramid generation.
//!
//! - [`AffinePyramidBuilder`]: the synchronous decode → resample → tile →
//!   commit pipeline
//! - [`PyramidService`]: async facade that runs the builder on the blocking
//!   pool and serves committed tiles through a memory cache

mod builder;
mod service;

pub use builder::AffinePyramidBuilder;
pub use service::{PyramidService, ServiceConfig, TileResponse};
