//! Registration geometry through the public API.

use overlay_pyramid::geometry::{
    check_control_points, compute_affine_matrix, compute_transformed_bounds,
    invert_affine_matrix, AffineMatrix, BoundingBox, ControlPoint, Point,
};
use overlay_pyramid::GeometryError;

#[test]
fn test_solve_then_place() {
    // Overlay scanned at half resolution and offset into the parent
    let points = [
        ControlPoint::new([100.0, 100.0], [1250.0, 850.0]),
        ControlPoint::new([3900.0, 200.0], [3150.0, 900.0]),
        ControlPoint::new([500.0, 2800.0], [1450.0, 2200.0]),
    ];
    let matrix = compute_affine_matrix(&points).unwrap();

    for p in &points {
        let mapped = matrix.apply(p.source);
        assert!(mapped.distance(&p.target) < 1e-6);
    }

    let bounds = compute_transformed_bounds(4000, 3000, &matrix);
    assert!((bounds.min_x - 1200.0).abs() < 1e-6);
    assert!((bounds.min_y - 800.0).abs() < 1e-6);
    assert!((bounds.width - 2000.0).abs() < 1e-6);
    assert!((bounds.height - 1500.0).abs() < 1e-6);
}

#[test]
fn test_scale_translate_strip_bounds() {
    let matrix = AffineMatrix::new(2.0, 0.0, 100.0, 0.0, 2.0, 50.0);
    let bounds = compute_transformed_bounds(1000, 1, &matrix);

    assert_eq!(
        bounds,
        BoundingBox {
            min_x: 100.0,
            min_y: 50.0,
            max_x: 2100.0,
            max_y: 52.0,
            width: 2000.0,
            height: 2.0,
        }
    );
    assert_eq!(bounds.raster_size(), (2000, 2));
}

#[test]
fn test_inverse_round_trip() {
    let matrix = AffineMatrix::new(0.93, -0.37, 812.5, 0.41, 1.07, -96.0);
    let inverse = invert_affine_matrix(&matrix).unwrap();
    let back = invert_affine_matrix(&inverse).unwrap();
    assert!(back.approx_eq(&matrix, 1e-9));

    let p = Point::new(321.0, 654.0);
    let q = inverse.apply(matrix.apply(p));
    assert!(q.distance(&p) < 1e-9);
}

#[test]
fn test_collinear_points_rejected() {
    let points = [
        ControlPoint::new([0.0, 0.0], [0.0, 0.0]),
        ControlPoint::new([10.0, 0.0], [5.0, 5.0]),
        ControlPoint::new([20.0, 0.0], [10.0, 20.0]),
    ];
    let err = compute_affine_matrix(&points).unwrap_err();
    assert!(matches!(err, GeometryError::CollinearPoints { .. }));

    let warnings = check_control_points(&points, (100, 100), (100, 100));
    assert!(warnings.iter().any(|w| w.starts_with("overlay: ")));
}
