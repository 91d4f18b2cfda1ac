//! Cache key derivation for source images.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Hex characters kept from the digest.
const HASH_LEN: usize = 32;

/// Derive a stable cache hash for the image at `path`.
///
/// Hashes the canonical path and the modification time, so the key changes
/// when the file is replaced but not when it is reached through a different
/// relative path.
pub fn derive_image_hash(path: &Path) -> Result<String, CacheError> {
    let canonical = fs::canonicalize(path).map_err(|e| CacheError::io(path, e))?;
    let modified = fs::metadata(&canonical)
        .and_then(|m| m.modified())
        .map_err(|e| CacheError::io(&canonical, e))?;
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(nanos.to_le_bytes());

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_LEN);
    Ok(digest)
}
