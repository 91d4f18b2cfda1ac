//! Configuration management for the overlay-pyramid CLI.
//!
//! This module provides:
//! - Command-line arguments via clap, one subcommand per operation
//! - Environment variables with `PYRAMID_` prefix
//! - Parsers for matrices, control points and sizes
//!
//! # Example
//!
//! ```ignore
//! use overlay_pyramid::config::Cli;
//!
//! let cli = Cli::parse();
//! cli.validate()?;
//! println!("Cache directory: {}", cli.cache_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `PYRAMID_CACHE_DIR` - Tile cache root (default: .tile-cache)
//! - `PYRAMID_HASH` - Cache key for `generate`, `check` and `delete`
//! - `PYRAMID_MEMORY_CACHE` - In-memory tile cache size in MiB (default: 64)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cache::{validate_hash, DEFAULT_MEMORY_CACHE_CAPACITY};
use crate::geometry::{AffineMatrix, ControlPoint, Point};
use crate::pyramid::ServiceConfig;

// =============================================================================
// Default Values
// =============================================================================

/// Default tile cache root, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".tile-cache";

/// Default in-memory tile cache size in MiB.
pub const DEFAULT_MEMORY_CACHE_MB: usize = DEFAULT_MEMORY_CACHE_CAPACITY / (1024 * 1024);

// =============================================================================
// CLI Arguments
// =============================================================================

/// Overlay Pyramid - affine tile pyramids for registered overlays.
///
/// Solves registrations from control points and renders an overlay into the
/// parent image's coordinate space as a cached WebP tile pyramid.
#[derive(Parser, Debug, Clone)]
#[command(name = "overlay-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory of the tile cache.
    #[arg(long, global = true, default_value = DEFAULT_CACHE_DIR, env = "PYRAMID_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Solve an affine matrix from three control points.
    Solve(SolveConfig),

    /// Compute where an overlay lands in parent space.
    Bounds(BoundsConfig),

    /// Generate (or reuse) the affine tile pyramid of an overlay.
    Generate(GenerateConfig),

    /// Exit 0 if cached tiles match a matrix, 1 otherwise.
    Check(CheckConfig),

    /// Delete the cached pyramid of a hash.
    Delete(DeleteConfig),
}

impl Cli {
    /// Validate global options and the selected subcommand.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(
                "Cache directory is required. Set --cache-dir or PYRAMID_CACHE_DIR".to_string(),
            );
        }

        match &self.command {
            Command::Solve(config) => config.validate(),
            Command::Bounds(config) => config.validate(),
            Command::Generate(config) => config.validate(),
            Command::Check(config) => validate_hash_arg(&config.hash),
            Command::Delete(config) => validate_hash_arg(&config.hash),
        }
    }
}

fn validate_hash_arg(hash: &str) -> Result<(), String> {
    validate_hash(hash).map_err(|e| e.to_string())
}

// =============================================================================
// Subcommand Arguments
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct SolveConfig {
    /// Control point as `sx,sy:tx,ty` (overlay → parent). Give exactly three.
    #[arg(long = "point", value_parser = parse_control_point, required = true)]
    pub points: Vec<ControlPoint>,

    /// Overlay size as `WxH`; enables distribution warnings and bounds output.
    #[arg(long, value_parser = parse_size)]
    pub source_size: Option<(u32, u32)>,

    /// Parent size as `WxH`; enables distribution warnings on the parent side.
    #[arg(long, value_parser = parse_size)]
    pub target_size: Option<(u32, u32)>,
}

impl SolveConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.points.len() != 3 {
            return Err(format!(
                "Exactly three --point values are required, got {}",
                self.points.len()
            ));
        }
        Ok(())
    }

    /// The three control points (call validate() first).
    pub fn control_points(&self) -> Result<[ControlPoint; 3], String> {
        self.points
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected 3 control points, got {}", self.points.len()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct BoundsConfig {
    /// Overlay width in pixels.
    #[arg(long)]
    pub width: u32,

    /// Overlay height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Forward matrix as `a,b,tx,c,d,ty`.
    #[arg(long, value_parser = parse_matrix, allow_hyphen_values = true)]
    pub matrix: AffineMatrix,
}

impl BoundsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateConfig {
    /// Overlay image to render.
    pub source: PathBuf,

    /// Forward matrix as `a,b,tx,c,d,ty`.
    #[arg(long, value_parser = parse_matrix, allow_hyphen_values = true)]
    pub matrix: AffineMatrix,

    /// Cache key; derived from the file path and mtime when omitted.
    #[arg(long, env = "PYRAMID_HASH")]
    pub hash: Option<String>,

    /// Regenerate even if matching tiles are cached.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// In-memory tile cache size in MiB.
    #[arg(long, default_value_t = DEFAULT_MEMORY_CACHE_MB, env = "PYRAMID_MEMORY_CACHE")]
    pub memory_cache_mb: usize,
}

impl GenerateConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.source.is_file() {
            return Err(format!(
                "Source image '{}' does not exist or is not a file",
                self.source.display()
            ));
        }
        if let Some(ref hash) = self.hash {
            validate_hash_arg(hash)?;
        }
        if self.memory_cache_mb == 0 {
            return Err("memory_cache_mb must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn service_config(&self, cache_dir: impl Into<PathBuf>) -> ServiceConfig {
        ServiceConfig::new(cache_dir)
            .with_memory_cache_capacity(self.memory_cache_mb.saturating_mul(1024 * 1024))
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Cache key to inspect.
    #[arg(long, env = "PYRAMID_HASH")]
    pub hash: String,

    /// Forward matrix as `a,b,tx,c,d,ty`.
    #[arg(long, value_parser = parse_matrix, allow_hyphen_values = true)]
    pub matrix: AffineMatrix,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteConfig {
    /// Cache key to delete.
    #[arg(long, env = "PYRAMID_HASH")]
    pub hash: String,
}

// =============================================================================
// Value Parsers
// =============================================================================

fn parse_numbers(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part))
        })
        .collect()
}

/// Parse `a,b,tx,c,d,ty` into a matrix.
pub fn parse_matrix(s: &str) -> Result<AffineMatrix, String> {
    AffineMatrix::try_from(parse_numbers(s)?).map_err(|e| e.to_string())
}

/// Parse `sx,sy:tx,ty` into a control point.
pub fn parse_control_point(s: &str) -> Result<ControlPoint, String> {
    let (source, target) = s
        .split_once(':')
        .ok_or_else(|| format!("'{}' is not of the form sx,sy:tx,ty", s))?;
    Ok(ControlPoint::new(parse_point(source)?, parse_point(target)?))
}

fn parse_point(s: &str) -> Result<Point, String> {
    match parse_numbers(s)?.as_slice() {
        &[x, y] if x.is_finite() && y.is_finite() => Ok(Point::new(x, y)),
        _ => Err(format!("'{}' is not a finite point x,y", s)),
    }
}

/// Parse `WxH` into a size.
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{}' is not of the form WxH", s))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h))?;
    Ok((width, height))
}

// =============================================================================
// Tests
// =============================================================================
