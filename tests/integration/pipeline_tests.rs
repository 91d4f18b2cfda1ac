//! End-to-end pyramid generation tests.
//!
//! Tests verify:
//! - Metadata describes the transformed raster and its placement
//! - Tiles cover the raster exactly, with transparent padding
//! - Previews are produced and never enlarged
//! - Progress is monotonic and ends at 100
//! - Failed runs publish nothing

use overlay_pyramid::cache::{TileStore, METADATA_FILE};
use overlay_pyramid::geometry::AffineMatrix;
use overlay_pyramid::tile::{TileCoordinate, PROGRESS_DECODED, PROGRESS_TILES_START};
use overlay_pyramid::{GeometryError, PyramidError};

use super::test_utils::{decode, is_valid_jpeg, is_valid_webp, ProgressRecorder, Workspace};

fn scale_translate() -> AffineMatrix {
    AffineMatrix::new(2.0, 0.0, 100.0, 0.0, 2.0, 50.0)
}

// =============================================================================
// Successful Generation
// =============================================================================

#[tokio::test]
async fn test_scale_translate_metadata() {
    let ws = Workspace::new();
    let source = ws.gradient_png("strip.png", 1000, 1);
    let service = ws.service();

    let meta = service
        .generate_affine_tiles(&source, "strip", scale_translate(), None)
        .await
        .unwrap();

    assert_eq!((meta.original_width, meta.original_height), (1000, 1));
    assert_eq!((meta.transformed_width, meta.transformed_height), (2000, 2));
    assert_eq!((meta.bounds_offset.x, meta.bounds_offset.y), (100.0, 50.0));
    assert_eq!(meta.affine_matrix, scale_translate());
    assert_eq!(meta.base.tile_size, 256);
    assert_eq!((meta.base.tiles_x, meta.base.tiles_y), (8, 1));
    assert_eq!(meta.base.total_tiles, 8);
    assert_eq!(meta.base.original_path, source.display().to_string());
}

#[tokio::test]
async fn test_metadata_file_is_camel_case_json() {
    let ws = Workspace::new();
    let source = ws.gradient_png("strip.png", 1000, 1);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "strip", scale_translate(), None)
        .await
        .unwrap();

    let path = service
        .store()
        .affine_tiles_dir("strip")
        .unwrap()
        .join(METADATA_FILE);
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();

    assert_eq!(json["version"], 1);
    assert_eq!(json["tileSize"], 256);
    assert_eq!(json["tilesX"], 8);
    assert_eq!(json["transformedWidth"], 2000);
    assert_eq!(json["boundsOffset"]["x"], 100.0);
    assert_eq!(json["boundsOffset"]["y"], 50.0);
    assert_eq!(
        json["affineMatrix"],
        serde_json::json!([2.0, 0.0, 100.0, 0.0, 2.0, 50.0])
    );
    assert!(json["createdAt"].is_u64());
}

#[tokio::test]
async fn test_tiles_are_full_size_and_padded() {
    let ws = Workspace::new();
    let source = ws.gradient_png("strip.png", 1000, 1);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "strip", scale_translate(), None)
        .await
        .unwrap();

    for x in 0..8 {
        let tile = service.affine_tile("strip", x, 0).await.unwrap().unwrap();
        assert!(is_valid_webp(&tile.data), "tile {} is not WebP", x);
        assert_eq!(decode(&tile.data).dimensions(), (256, 256));
    }
    assert!(service.affine_tile("strip", 8, 0).await.unwrap().is_none());
    assert!(service.affine_tile("strip", 0, 1).await.unwrap().is_none());

    // Raster column 1802 lies inside the overlay, column 2000+ is padding
    let last = decode(&service.affine_tile("strip", 7, 0).await.unwrap().unwrap().data);
    assert_eq!(last.get_pixel(10, 0).0[3], 255);
    assert_eq!(last.get_pixel(250, 0).0[3], 0);
    assert_eq!(last.get_pixel(10, 100).0[3], 0);
}

#[tokio::test]
async fn test_tile_coverage_reconstructs_raster() {
    let ws = Workspace::new();
    let source = ws.solid_png("square.png", 300, 300, [0, 0, 255, 255]);
    let store = TileStore::new(ws.cache_dir());
    let service = ws.service();

    // Exact pixel shift keeps every output pixel fully opaque
    let matrix = AffineMatrix::new(1.0, 0.0, 7.0, 0.0, 1.0, 3.0);
    let meta = service
        .generate_affine_tiles(&source, "square", matrix, None)
        .await
        .unwrap();
    assert_eq!((meta.base.width, meta.base.height), (300, 300));
    assert_eq!((meta.base.tiles_x, meta.base.tiles_y), (2, 2));

    let mut covered = 0u64;
    for coord in meta.grid().coordinates() {
        let tile = decode(&store.load_affine_tile("square", coord).unwrap().unwrap());
        let (ox, oy) = coord.pixel_origin();
        for (x, y, px) in tile.enumerate_pixels() {
            let inside = ox + x < 300 && oy + y < 300;
            assert_eq!(px.0[3] == 255, inside, "pixel ({}, {})", ox + x, oy + y);
            covered += u64::from(inside);
        }
    }
    assert_eq!(covered, 300 * 300);
}

#[tokio::test]
async fn test_previews_never_enlarge() {
    let ws = Workspace::new();
    let source = ws.gradient_png("strip.png", 1000, 1);
    let service = ws.service();
    service
        .generate_affine_tiles(&source, "strip", scale_translate(), None)
        .await
        .unwrap();

    let thumbnail = service.store().load_affine_thumbnail("strip").unwrap().unwrap();
    let medium = service.store().load_affine_medium("strip").unwrap().unwrap();
    assert!(is_valid_jpeg(&thumbnail));
    assert!(is_valid_jpeg(&medium));

    assert_eq!(decode(&thumbnail).dimensions(), (512, 1));
    // 2000 px already fits the 2048 box
    assert_eq!(decode(&medium).dimensions(), (2000, 2));
}

#[tokio::test]
async fn test_progress_sequence() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 600, 300);
    let service = ws.service();
    let recorder = ProgressRecorder::new();

    let meta = service
        .generate_affine_tiles(&source, "overlay", AffineMatrix::IDENTITY, Some(recorder.callback()))
        .await
        .unwrap();
    assert_eq!(meta.base.total_tiles, 6);

    let values = recorder.values();
    assert_eq!(values.first(), Some(&PROGRESS_DECODED));
    assert_eq!(values.last(), Some(&100));
    assert!(values.contains(&PROGRESS_TILES_START));
    assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}", values);
    assert!(values.iter().all(|&p| p <= 100));
}

#[tokio::test]
async fn test_regeneration_leaves_no_stale_tiles() {
    let ws = Workspace::new();
    let source = ws.gradient_png("strip.png", 1000, 1);
    let service = ws.service();

    service
        .generate_affine_tiles(&source, "strip", scale_translate(), None)
        .await
        .unwrap();
    assert!(service.affine_tile("strip", 7, 0).await.unwrap().is_some());

    let meta = service
        .generate_affine_tiles(&source, "strip", AffineMatrix::IDENTITY, None)
        .await
        .unwrap();
    assert_eq!(meta.base.tiles_x, 4);
    assert!(service.affine_tile("strip", 7, 0).await.unwrap().is_none());
    assert!(service
        .store()
        .load_affine_tile("strip", TileCoordinate::new(3, 0))
        .unwrap()
        .is_some());
}

// =============================================================================
// Failed Generation
// =============================================================================

#[tokio::test]
async fn test_singular_matrix_publishes_nothing() {
    let ws = Workspace::new();
    let source = ws.gradient_png("overlay.png", 64, 64);
    let service = ws.service();
    let recorder = ProgressRecorder::new();

    let degenerate = AffineMatrix::new(1.0, 1.0, 0.0, 1.0, 1.0, 0.0);
    let result = service
        .generate_affine_tiles(&source, "flat", degenerate, Some(recorder.callback()))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        PyramidError::Registration(GeometryError::SingularMatrix { .. })
    ));
    assert!(err.to_string().contains("collinear or degenerate"));
    assert!(service.affine_metadata("flat").await.unwrap().is_none());
    assert!(!service
        .has_matching_affine_tiles("flat", &degenerate)
        .await);
    assert!(!recorder.values().contains(&100));
}

#[tokio::test]
async fn test_corrupt_source_is_decode_error() {
    let ws = Workspace::new();
    let source = ws.path().join("broken.png");
    std::fs::write(&source, b"definitely not a png").unwrap();

    let result = ws
        .service()
        .generate_affine_tiles(&source, "broken", AffineMatrix::IDENTITY, None)
        .await;

    match result {
        Err(PyramidError::Decode { path, .. }) => assert!(path.ends_with("broken.png")),
        other => panic!("expected decode error, got {:?}", other),
    }
}
