//! Affine registration geometry.
//!
//! Everything here is pure arithmetic on `f64` values: solving a forward
//! matrix from three control-point pairs, inverting it for resampling,
//! computing where an overlay lands in parent space, and advisory checks on
//! how well a set of control points constrains the transform.
//!
//! ```
//! use overlay_pyramid::geometry::{compute_affine_matrix, compute_transformed_bounds, ControlPoint};
//!
//! let points = [
//!     ControlPoint::new([0.0, 0.0], [10.0, 20.0]),
//!     ControlPoint::new([100.0, 0.0], [210.0, 20.0]),
//!     ControlPoint::new([0.0, 100.0], [10.0, 220.0]),
//! ];
//! let matrix = compute_affine_matrix(&points).unwrap();
//! let bounds = compute_transformed_bounds(640, 480, &matrix);
//! assert_eq!(bounds.raster_size(), (1280, 960));
//! ```

mod matrix;
mod quality;

pub use matrix::{
    compute_affine_matrix, compute_transformed_bounds, invert_affine_matrix, is_degenerate,
    AffineMatrix, BoundingBox, ControlPoint, Point, DETERMINANT_EPSILON,
};
pub use quality::{
    are_points_collinear, check_control_points, check_point_distribution,
    DEFAULT_COLLINEAR_AREA_THRESHOLD, DEFAULT_MIN_DISTANCE_RATIO,
};
