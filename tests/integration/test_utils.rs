//! Test utilities for integration tests.
//!
//! Helpers for writing overlay fixtures into temporary directories and for
//! inspecting the encoded artifacts a pyramid run produces.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use overlay_pyramid::pyramid::{PyramidService, ServiceConfig};
use overlay_pyramid::tile::ProgressCallback;

// =============================================================================
// Fixtures
// =============================================================================

/// A temporary workspace holding source images and a tile cache.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn service(&self) -> PyramidService {
        PyramidService::from_config(&ServiceConfig::new(self.cache_dir()))
    }

    /// Write an opaque gradient PNG of the given size.
    pub fn gradient_png(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.dir.path().join(name);
        create_gradient(width, height).save(&path).unwrap();
        path
    }

    /// Write a PNG filled with one colour.
    pub fn solid_png(&self, name: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
        let path = self.dir.path().join(name);
        RgbaImage::from_pixel(width, height, Rgba(color))
            .save(&path)
            .unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Opaque gradient: red follows x, green follows y.
pub fn create_gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    })
}

// =============================================================================
// Artifact Inspection
// =============================================================================

/// Check for a RIFF/WEBP container header.
pub fn is_valid_webp(data: &[u8]) -> bool {
    data.len() > 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Check for JPEG SOI and EOI markers.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

pub fn decode(data: &[u8]) -> RgbaImage {
    image::load_from_memory(data).unwrap().to_rgba8()
}

// =============================================================================
// Progress Recording
// =============================================================================

/// Collects every progress value a run reports.
#[derive(Clone, Default)]
pub struct ProgressRecorder {
    values: Arc<Mutex<Vec<u8>>>,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> ProgressCallback {
        let values = Arc::clone(&self.values);
        Box::new(move |p| values.lock().unwrap().push(p))
    }

    pub fn values(&self) -> Vec<u8> {
        self.values.lock().unwrap().clone()
    }
}
