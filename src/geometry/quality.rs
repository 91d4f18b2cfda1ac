//! Advisory checks on control-point placement.
//!
//! None of these block generation. They produce booleans and human-readable
//! warnings the caller can show before committing to a (possibly long) run.

use super::matrix::{ControlPoint, Point};

/// Triangle area, in square pixels, below which points count as collinear.
pub const DEFAULT_COLLINEAR_AREA_THRESHOLD: f64 = 100.0;

/// Minimum pairwise distance as a fraction of the shorter image side.
pub const DEFAULT_MIN_DISTANCE_RATIO: f64 = 0.1;

fn triangle_area(points: &[Point; 3]) -> f64 {
    let [p1, p2, p3] = points;
    0.5 * (p1.x * (p2.y - p3.y) + p2.x * (p3.y - p1.y) + p3.x * (p1.y - p2.y)).abs()
}

/// Returns `true` if the triangle spanned by `points` is thinner than
/// `area_threshold` square pixels.
pub fn are_points_collinear(points: &[Point; 3], area_threshold: f64) -> bool {
    triangle_area(points) < area_threshold
}

/// Warn about points that sit too close together to pin down a transform.
///
/// Every pair closer than `min_ratio · min(width, height)` yields one
/// warning, and a nearly collinear triple yields another.
pub fn check_point_distribution(
    points: &[Point; 3],
    width: u32,
    height: u32,
    min_ratio: f64,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let min_distance = min_ratio * f64::from(width.min(height));

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let distance = points[i].distance(&points[j]);
            if distance < min_distance {
                warnings.push(format!(
                    "Points {} and {} are only {:.1}px apart; spread them at least {:.1}px apart",
                    i + 1,
                    j + 1,
                    distance,
                    min_distance
                ));
            }
        }
    }

    if are_points_collinear(points, DEFAULT_COLLINEAR_AREA_THRESHOLD) {
        warnings.push(format!(
            "Points are nearly collinear (triangle area {:.1}px²); the transform will be unstable",
            triangle_area(points)
        ));
    }

    warnings
}

/// Run the distribution checks on both sides of a registration.
///
/// `source_size` is the overlay size, `target_size` the parent size. Each
/// warning is prefixed with the side it concerns.
pub fn check_control_points(
    points: &[ControlPoint; 3],
    source_size: (u32, u32),
    target_size: (u32, u32),
) -> Vec<String> {
    let sides = [
        ("overlay", points.map(|p| p.source), source_size),
        ("parent", points.map(|p| p.target), target_size),
    ];

    sides
        .into_iter()
        .flat_map(|(side, pts, (w, h))| {
            check_point_distribution(&pts, w, h, DEFAULT_MIN_DISTANCE_RATIO)
                .into_iter()
                .map(move |warning| format!("{}: {}", side, warning))
        })
        .collect()
}
