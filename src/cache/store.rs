//! Filesystem tile cache with staged publishing.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── affine/<hash>/
//! │   ├── metadata.json
//! │   ├── thumbnail.jpg
//! │   ├── medium.jpg
//! │   └── tiles/<x>_<y>.webp
//! └── .staging/<hash>-<generation>/   (same shape, private to one run)
//! ```
//!
//! # Commit discipline
//!
//! A run writes into its own staging directory. [`StagedArtifacts::commit`]
//! writes `metadata.json` last and renames the whole directory into place,
//! so `affine/<hash>/` either holds a complete generation or does not exist.
//! A previous generation is renamed aside first and removed after the swap.
//! Staging directories that are dropped without a commit remove themselves.
//!
//! Every artifact is fsynced as it is written, and the staging directories
//! before the rename, so a published directory never references data that
//! is not on disk. The `affine/` directory is fsynced after each rename.
//!
//! Entries a crashed run left under `.staging/` are swept once they are
//! older than [`STALE_STAGING_AGE`].

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CacheError;
use crate::geometry::AffineMatrix;
use crate::tile::{ArtifactSink, TileCoordinate};

use super::metadata::AffineTileMetadata;

const AFFINE_DIR: &str = "affine";
const STAGING_DIR: &str = ".staging";
const TILES_DIR: &str = "tiles";

/// Metadata file name inside a pyramid directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Thumbnail file name inside a pyramid directory.
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// Medium preview file name inside a pyramid directory.
pub const MEDIUM_FILE: &str = "medium.jpg";

/// Age past which a staging entry is assumed to belong to a dead run.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Check that `hash` is safe to use as a single path component.
pub fn validate_hash(hash: &str) -> Result<(), CacheError> {
    let valid = !hash.is_empty()
        && hash
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidHash {
            hash: hash.to_string(),
        })
    }
}

fn tile_file_name(coord: TileCoordinate) -> String {
    format!("{}_{}.webp", coord.tile_x, coord.tile_y)
}

// =============================================================================
// TileStore
// =============================================================================

/// Durable per-hash storage for affine pyramids.
///
/// All methods do blocking filesystem I/O; async callers go through
/// [`crate::pyramid::PyramidService`].
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    /// Store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public directory of the affine pyramid for `hash`.
    pub fn affine_tiles_dir(&self, hash: &str) -> Result<PathBuf, CacheError> {
        validate_hash(hash)?;
        Ok(self.root.join(AFFINE_DIR).join(hash))
    }

    fn staging_root(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Open a private staging area for a new generation of `hash`.
    pub fn stage_affine(&self, hash: &str) -> Result<StagedArtifacts, CacheError> {
        let target = self.affine_tiles_dir(hash)?;
        let generation = Uuid::new_v4();
        let staging_root = self.staging_root();

        let swept = self.sweep_staging(STALE_STAGING_AGE);
        if swept > 0 {
            info!(swept, "removed stale staging entries");
        }

        let staging = staging_root.join(format!("{}-{}", hash, generation));

        let tiles = staging.join(TILES_DIR);
        fs::create_dir_all(&tiles).map_err(|e| CacheError::io(&tiles, e))?;
        debug!(hash, %generation, path = %staging.display(), "staging area created");

        Ok(StagedArtifacts {
            hash: hash.to_string(),
            generation,
            staging,
            staging_root,
            target,
            committed: false,
        })
    }

    /// Remove staging entries last modified more than `max_age` ago.
    ///
    /// Returns how many were removed. Unreadable entries are skipped.
    pub fn sweep_staging(&self, max_age: Duration) -> usize {
        let Ok(entries) = fs::read_dir(self.staging_root()) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            match age {
                Some(age) if age >= max_age => {
                    let path = entry.path();
                    debug!(path = %path.display(), ?age, "sweeping stale staging entry");
                    let result = if path.is_dir() {
                        fs::remove_dir_all(&path)
                    } else {
                        fs::remove_file(&path)
                    };
                    match result {
                        Ok(()) => removed += 1,
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "failed to sweep staging entry")
                        }
                    }
                }
                _ => {}
            }
        }
        removed
    }

    /// Load the committed metadata for `hash`.
    ///
    /// Returns `Ok(None)` if nothing is committed, and
    /// [`CacheError::CorruptMetadata`] if the file does not parse.
    pub fn load_affine_metadata(
        &self,
        hash: &str,
    ) -> Result<Option<AffineTileMetadata>, CacheError> {
        let path = self.affine_tiles_dir(hash)?.join(METADATA_FILE);
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CacheError::CorruptMetadata {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Whether the committed pyramid for `hash` was built from `matrix`.
    ///
    /// Missing, unreadable or mismatching metadata all mean "regenerate"
    /// and return `false`.
    pub fn has_matching_affine_tiles(&self, hash: &str, matrix: &AffineMatrix) -> bool {
        match self.load_affine_metadata(hash) {
            Ok(Some(meta)) => {
                let matches = meta.matches_matrix(matrix);
                debug!(hash, matches, "compared cached affine matrix");
                matches
            }
            Ok(None) => false,
            Err(e) => {
                warn!(hash, error = %e, "ignoring unreadable affine metadata");
                false
            }
        }
    }

    /// Read one committed tile.
    pub fn load_affine_tile(
        &self,
        hash: &str,
        coord: TileCoordinate,
    ) -> Result<Option<Bytes>, CacheError> {
        let path = self
            .affine_tiles_dir(hash)?
            .join(TILES_DIR)
            .join(tile_file_name(coord));
        Ok(read_optional(&path)?.map(Bytes::from))
    }

    /// Read the committed thumbnail.
    pub fn load_affine_thumbnail(&self, hash: &str) -> Result<Option<Bytes>, CacheError> {
        let path = self.affine_tiles_dir(hash)?.join(THUMBNAIL_FILE);
        Ok(read_optional(&path)?.map(Bytes::from))
    }

    /// Read the committed medium preview.
    pub fn load_affine_medium(&self, hash: &str) -> Result<Option<Bytes>, CacheError> {
        let path = self.affine_tiles_dir(hash)?.join(MEDIUM_FILE);
        Ok(read_optional(&path)?.map(Bytes::from))
    }

    /// Remove the tiles, previews and metadata of `hash` in one step.
    ///
    /// The directory is renamed out of the public tree before it is
    /// removed, so readers never see a half-deleted pyramid. Returns
    /// `false` if there was nothing to delete.
    pub fn delete_affine_tiles(&self, hash: &str) -> Result<bool, CacheError> {
        let target = self.affine_tiles_dir(hash)?;
        let staging_root = self.staging_root();
        fs::create_dir_all(&staging_root).map_err(|e| CacheError::io(&staging_root, e))?;

        let doomed = staging_root.join(format!("{}-{}.deleted", hash, Uuid::new_v4()));
        match fs::rename(&target, &doomed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(CacheError::io(&target, e)),
        }
        if let Some(parent) = target.parent() {
            sync_dir_logged(parent);
        }

        remove_dir_logged(&doomed);
        info!(hash, "deleted affine tiles");
        Ok(true)
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let mut file = fs::File::create(path).map_err(|e| CacheError::io(path, e))?;
    file.write_all(data).map_err(|e| CacheError::io(path, e))?;
    file.sync_all().map_err(|e| CacheError::io(path, e))
}

/// Flush a directory's entries to disk.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<(), CacheError> {
    fs::File::open(path)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| CacheError::io(path, e))
}

/// Directories cannot be opened as files here; renames are not ordered.
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<(), CacheError> {
    Ok(())
}

/// For renames that already happened; the caller cannot undo them.
fn sync_dir_logged(path: &Path) {
    if let Err(e) = sync_dir(path) {
        warn!(path = %path.display(), error = %e, "failed to sync directory");
    }
}

fn remove_dir_logged(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove directory"),
    }
}

// =============================================================================
// StagedArtifacts
// =============================================================================

/// Private output directory of one generation run.
///
/// Implements [`ArtifactSink`]. Nothing written here is visible to readers
/// until [`commit`](Self::commit) succeeds.
#[derive(Debug)]
pub struct StagedArtifacts {
    hash: String,
    generation: Uuid,
    staging: PathBuf,
    staging_root: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedArtifacts {
    pub fn generation_id(&self) -> Uuid {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Write `metadata` and publish the generation.
    ///
    /// Returns the public directory.
    pub fn commit(mut self, metadata: &AffineTileMetadata) -> Result<PathBuf, CacheError> {
        let json = serde_json::to_vec_pretty(metadata).map_err(|e| CacheError::Io {
            path: self.staging.join(METADATA_FILE).display().to_string(),
            message: e.to_string(),
        })?;
        write_file(&self.staging.join(METADATA_FILE), &json)?;
        sync_dir(&self.staging.join(TILES_DIR))?;
        sync_dir(&self.staging)?;

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let previous = self
            .staging_root
            .join(format!("{}-{}.previous", self.hash, self.generation));
        let had_previous = match fs::rename(&self.target, &previous) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(CacheError::io(&self.target, e)),
        };

        if let Err(e) = fs::rename(&self.staging, &self.target) {
            if had_previous {
                // Fails if a concurrent run published in the meantime
                if let Err(restore) = fs::rename(&previous, &self.target) {
                    warn!(hash = %self.hash, error = %restore, "failed to restore previous generation");
                    remove_dir_logged(&previous);
                }
            }
            return Err(CacheError::io(&self.target, e));
        }
        self.committed = true;
        if let Some(parent) = self.target.parent() {
            sync_dir_logged(parent);
        }

        if had_previous {
            remove_dir_logged(&previous);
        }
        info!(hash = %self.hash, generation = %self.generation, "committed affine tiles");
        Ok(self.target.clone())
    }
}

impl ArtifactSink for StagedArtifacts {
    fn save_thumbnail(&mut self, data: &[u8]) -> Result<(), CacheError> {
        write_file(&self.staging.join(THUMBNAIL_FILE), data)
    }

    fn save_medium(&mut self, data: &[u8]) -> Result<(), CacheError> {
        write_file(&self.staging.join(MEDIUM_FILE), data)
    }

    fn save_tile(&mut self, coord: TileCoordinate, data: &[u8]) -> Result<(), CacheError> {
        let path = self.staging.join(TILES_DIR).join(tile_file_name(coord));
        write_file(&path, data)
    }
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        if !self.committed {
            debug!(hash = %self.hash, generation = %self.generation, "discarding staged artifacts");
            remove_dir_logged(&self.staging);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
