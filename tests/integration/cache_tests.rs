//! Tile cache integration tests.
//!
//! Tests verify:
//! - Matrix matching tolerance against committed metadata
//! - Deletion removes every artifact and evicts cached tiles
//! - Unreadable metadata forces regeneration instead of failing
//! - Distinct hashes generate concurrently without interference

use overlay_pyramid::cache::{derive_image_hash, TileStore, METADATA_FILE};
use overlay_pyramid::geometry::AffineMatrix;
use overlay_pyramid::tile::TileCoordinate;

use super::test_utils::Workspace;

fn registration() -> AffineMatrix {
    AffineMatrix::new(0.8, -0.2, 150.0, 0.2, 0.8, 40.0)
}

fn drift(matrix: AffineMatrix, delta: f64) -> AffineMatrix {
    AffineMatrix::from(matrix.to_array().map(|v| v + delta))
}

// =============================================================================
// Cache Matching
// =============================================================================

#[tokio::test]
async fn test_match_tolerance() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 120, 80);
    let service = ws.service();

    assert!(!service.has_matching_affine_tiles("h", &registration()).await);

    service
        .generate_affine_tiles(&source, "h", registration(), None)
        .await
        .unwrap();

    assert!(service.has_matching_affine_tiles("h", &registration()).await);
    assert!(service.has_matching_affine_tiles("h", &drift(registration(), 1e-7)).await);
    assert!(!service.has_matching_affine_tiles("h", &drift(registration(), 1e-4)).await);
    assert!(!service.has_matching_affine_tiles("other", &registration()).await);
}

#[tokio::test]
async fn test_corrupt_metadata_means_regenerate() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 40, 40);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "h", registration(), None)
        .await
        .unwrap();

    let metadata_path = service.store().affine_tiles_dir("h").unwrap().join(METADATA_FILE);
    std::fs::write(&metadata_path, b"{ truncated").unwrap();

    assert!(!service.has_matching_affine_tiles("h", &registration()).await);
    assert!(service.affine_metadata("h").await.is_err());

    // A fresh run replaces the damaged generation
    service
        .generate_affine_tiles(&source, "h", registration(), None)
        .await
        .unwrap();
    assert!(service.has_matching_affine_tiles("h", &registration()).await);
}

#[tokio::test]
async fn test_short_matrix_in_metadata_is_not_a_match() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 40, 40);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "h", AffineMatrix::IDENTITY, None)
        .await
        .unwrap();

    let metadata_path = service.store().affine_tiles_dir("h").unwrap().join(METADATA_FILE);
    let mut json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&metadata_path).unwrap()).unwrap();
    json["affineMatrix"] = serde_json::json!([1.0, 0.0, 0.0, 0.0, 1.0]);
    std::fs::write(&metadata_path, serde_json::to_vec(&json).unwrap()).unwrap();

    assert!(!service.has_matching_affine_tiles("h", &AffineMatrix::IDENTITY).await);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_removes_all_artifacts() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 300, 300);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "h", AffineMatrix::IDENTITY, None)
        .await
        .unwrap();
    service.affine_tile("h", 1, 1).await.unwrap().unwrap();
    let (_, _, cached) = service.cache_stats().await;
    assert_eq!(cached, 1);

    assert!(service.delete_affine_tiles("h").await.unwrap());

    let store = service.store();
    assert!(!store.affine_tiles_dir("h").unwrap().exists());
    assert!(store.load_affine_thumbnail("h").unwrap().is_none());
    assert!(store.load_affine_medium("h").unwrap().is_none());
    assert!(store
        .load_affine_tile("h", TileCoordinate::new(0, 0))
        .unwrap()
        .is_none());
    assert!(service.affine_tile("h", 1, 1).await.unwrap().is_none());
    assert_eq!(service.cache_stats().await.2, 0);
    assert!(!service.has_matching_affine_tiles("h", &AffineMatrix::IDENTITY).await);

    assert!(!service.delete_affine_tiles("h").await.unwrap());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_distinct_hashes_generate_concurrently() {
    let ws = Workspace::new();
    let first = ws.gradient_png("a.png", 300, 100);
    let second = ws.gradient_png("b.png", 100, 300);
    let service = ws.service();

    let (a, b) = tokio::join!(
        service.generate_affine_tiles(&first, "a", AffineMatrix::IDENTITY, None),
        service.generate_affine_tiles(&second, "b", registration(), None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!((a.base.tiles_x, a.base.tiles_y), (2, 1));
    assert_eq!(service.affine_metadata("a").await.unwrap(), Some(a));
    assert_eq!(service.affine_metadata("b").await.unwrap(), Some(b));

    // Nothing left behind in staging
    let staging = ws.cache_dir().join(".staging");
    assert_eq!(std::fs::read_dir(staging).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_hash_runs_publish_a_complete_generation() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 200, 200);
    let service = ws.service();
    let doubled = AffineMatrix::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0);

    let (a, b) = tokio::join!(
        service.generate_affine_tiles(&source, "h", AffineMatrix::IDENTITY, None),
        service.generate_affine_tiles(&source, "h", doubled, None),
    );
    assert!(a.is_ok() || b.is_ok());

    // Whichever generation won, its metadata and tiles agree
    let meta = service.affine_metadata("h").await.unwrap().unwrap();
    let store = TileStore::new(ws.cache_dir());
    for coord in meta.grid().coordinates() {
        assert!(store.load_affine_tile("h", coord).unwrap().is_some());
    }
    let beyond = TileCoordinate::new(meta.base.tiles_x, 0);
    assert!(store.load_affine_tile("h", beyond).unwrap().is_none());
}

// =============================================================================
// Hash Derivation
// =============================================================================

#[test]
fn test_derived_hash_is_a_valid_cache_key() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 8, 8);

    let hash = derive_image_hash(&source).unwrap();
    let store = TileStore::new(ws.cache_dir());
    assert!(store.affine_tiles_dir(&hash).is_ok());
    assert_eq!(hash, derive_image_hash(&source).unwrap());
}
