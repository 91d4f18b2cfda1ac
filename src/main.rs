//! Overlay Pyramid - affine tile pyramids for registered overlays.
//!
//! This binary parses the CLI, configures logging and runs one subcommand.
//! Results are printed to stdout as JSON; logs go to stderr.

use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overlay_pyramid::{
    cache::derive_image_hash,
    config::{BoundsConfig, Cli, Command, GenerateConfig, SolveConfig},
    geometry::{
        check_control_points, check_point_distribution, compute_affine_matrix,
        compute_transformed_bounds, AffineMatrix, BoundingBox, DEFAULT_MIN_DISTANCE_RATIO,
    },
    pyramid::{PyramidService, ServiceConfig},
    tile::ProgressCallback,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Command::Solve(config) => run_solve(config),
        Command::Bounds(config) => run_bounds(config),
        Command::Generate(config) => run_generate(&cli.cache_dir, config).await,
        Command::Check(config) => {
            let service = PyramidService::from_config(&ServiceConfig::new(&cli.cache_dir));
            if service.has_matching_affine_tiles(&config.hash, &config.matrix).await {
                info!("Cached tiles for {} match the matrix", config.hash);
                ExitCode::SUCCESS
            } else {
                info!("No matching tiles for {}", config.hash);
                ExitCode::FAILURE
            }
        }
        Command::Delete(config) => {
            let service = PyramidService::from_config(&ServiceConfig::new(&cli.cache_dir));
            match service.delete_affine_tiles(&config.hash).await {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => {
                    info!("Nothing cached for {}", config.hash);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "overlay_pyramid=debug"
    } else {
        "overlay_pyramid=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Placement {
    bounds: BoundingBox,
    raster_size: [u32; 2],
}

impl Placement {
    fn new(width: u32, height: u32, matrix: &AffineMatrix) -> Self {
        let bounds = compute_transformed_bounds(width, height, matrix);
        let (w, h) = bounds.raster_size();
        Self {
            bounds,
            raster_size: [w, h],
        }
    }
}

// =============================================================================
// Solve Command
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveOutput {
    matrix: [f64; 6],
    #[serde(skip_serializing_if = "Option::is_none")]
    placement: Option<Placement>,
    warnings: Vec<String>,
}

fn run_solve(config: &SolveConfig) -> ExitCode {
    let points = match config.control_points() {
        Ok(points) => points,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let matrix = match compute_affine_matrix(&points) {
        Ok(matrix) => matrix,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!(matrix = ?matrix.to_array(), "solved affine matrix");

    let warnings = match (config.source_size, config.target_size) {
        (Some(source), Some(target)) => check_control_points(&points, source, target),
        (Some((w, h)), None) => check_point_distribution(
            &points.map(|p| p.source),
            w,
            h,
            DEFAULT_MIN_DISTANCE_RATIO,
        ),
        (None, Some((w, h))) => check_point_distribution(
            &points.map(|p| p.target),
            w,
            h,
            DEFAULT_MIN_DISTANCE_RATIO,
        ),
        (None, None) => Vec::new(),
    };

    print_json(&SolveOutput {
        matrix: matrix.to_array(),
        placement: config
            .source_size
            .map(|(w, h)| Placement::new(w, h, &matrix)),
        warnings,
    })
}

// =============================================================================
// Bounds Command
// =============================================================================

fn run_bounds(config: &BoundsConfig) -> ExitCode {
    print_json(&Placement::new(config.width, config.height, &config.matrix))
}

// =============================================================================
// Generate Command
// =============================================================================

async fn run_generate(cache_dir: &Path, config: &GenerateConfig) -> ExitCode {
    let hash = match &config.hash {
        Some(hash) => hash.clone(),
        None => match derive_image_hash(&config.source) {
            Ok(hash) => hash,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    info!("Source: {}", config.source.display());
    info!("Hash: {}", hash);
    info!("Cache: {}", cache_dir.display());

    let service = PyramidService::from_config(&config.service_config(cache_dir));

    if !config.force && service.has_matching_affine_tiles(&hash, &config.matrix).await {
        info!("Cached tiles are up to date, skipping generation");
        return match service.affine_metadata(&hash).await {
            Ok(Some(meta)) => print_json(&meta),
            Ok(None) => {
                error!("Metadata for {} disappeared while reading", hash);
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let on_progress: ProgressCallback = Box::new(|percent| info!("  progress: {}%", percent));
    match service
        .generate_affine_tiles(&config.source, &hash, config.matrix, Some(on_progress))
        .await
    {
        Ok(meta) => print_json(&meta),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
