//! Affine matrix value type, solver and inverse.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Determinants with an absolute value strictly below this are degenerate.
///
/// `|det| == DETERMINANT_EPSILON` is still accepted. The same test guards
/// both the control-point solver and the matrix inverse.
pub const DETERMINANT_EPSILON: f64 = 1e-10;

/// Returns `true` if `det` cannot be divided by safely.
#[inline]
pub fn is_degenerate(det: f64) -> bool {
    !det.is_finite() || det.abs() < DETERMINANT_EPSILON
}

// =============================================================================
// Points
// =============================================================================

/// A position in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// A source/target correspondence picked during registration.
///
/// `source` is in overlay pixels, `target` in parent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub source: Point,
    pub target: Point,
}

impl ControlPoint {
    pub fn new(source: impl Into<Point>, target: impl Into<Point>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

// =============================================================================
// AffineMatrix
// =============================================================================

/// 2×3 affine transform.
///
/// Maps `(x, y)` to `(a·x + b·y + tx, c·x + d·y + ty)`. On disk and on the
/// command line it is the flat array `[a, b, tx, c, d, ty]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 6]", try_from = "Vec<f64>")]
pub struct AffineMatrix {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub c: f64,
    pub d: f64,
    pub ty: f64,
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        a: 1.0,
        b: 0.0,
        tx: 0.0,
        c: 0.0,
        d: 1.0,
        ty: 0.0,
    };

    pub const fn new(a: f64, b: f64, tx: f64, c: f64, d: f64, ty: f64) -> Self {
        Self { a, b, tx, c, d, ty }
    }

    /// Components in `[a, b, tx, c, d, ty]` order.
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.tx, self.c, self.d, self.ty]
    }

    /// Determinant of the 2×2 linear block.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Transform a single point.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.b * p.y + self.tx,
            y: self.c * p.x + self.d * p.y + self.ty,
        }
    }

    /// Component-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &AffineMatrix, tolerance: f64) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(x, y)| (x - y).abs() <= tolerance)
    }

    /// Inverse transform. See [`invert_affine_matrix`].
    pub fn inverse(&self) -> Result<AffineMatrix, GeometryError> {
        invert_affine_matrix(self)
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f64; 6]> for AffineMatrix {
    fn from([a, b, tx, c, d, ty]: [f64; 6]) -> Self {
        Self { a, b, tx, c, d, ty }
    }
}

impl From<AffineMatrix> for [f64; 6] {
    fn from(m: AffineMatrix) -> Self {
        m.to_array()
    }
}

impl TryFrom<&[f64]> for AffineMatrix {
    type Error = GeometryError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; 6] = values.try_into().map_err(|_| GeometryError::InvalidMatrix {
            reason: format!("expected 6 components, got {}", values.len()),
        })?;
        if let Some(bad) = array.iter().find(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidMatrix {
                reason: format!("component {} is not finite", bad),
            });
        }
        Ok(array.into())
    }
}

impl TryFrom<Vec<f64>> for AffineMatrix {
    type Error = GeometryError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        AffineMatrix::try_from(values.as_slice())
    }
}

// =============================================================================
// Solver
// =============================================================================

/// 3×3 determinant by cofactor expansion along the first row.
fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Replace column `col` of `m` with `values`.
fn with_column(mut m: [[f64; 3]; 3], col: usize, values: [f64; 3]) -> [[f64; 3]; 3] {
    for (row, value) in m.iter_mut().zip(values) {
        row[col] = value;
    }
    m
}

/// Solve `m · [p, q, r]ᵀ = rhs` by Cramer's rule.
fn cramer(m: [[f64; 3]; 3], det: f64, rhs: [f64; 3]) -> (f64, f64, f64) {
    (
        det3(with_column(m, 0, rhs)) / det,
        det3(with_column(m, 1, rhs)) / det,
        det3(with_column(m, 2, rhs)) / det,
    )
}

/// Solve the forward matrix mapping each `source` onto its `target`.
///
/// # Errors
///
/// [`GeometryError::CollinearPoints`] when the source points are (nearly)
/// on one line, i.e. the source determinant is degenerate.
pub fn compute_affine_matrix(points: &[ControlPoint; 3]) -> Result<AffineMatrix, GeometryError> {
    let m = points.map(|p| [p.source.x, p.source.y, 1.0]);
    let det = det3(m);
    if is_degenerate(det) {
        return Err(GeometryError::CollinearPoints { determinant: det });
    }

    let (a, b, tx) = cramer(m, det, points.map(|p| p.target.x));
    let (c, d, ty) = cramer(m, det, points.map(|p| p.target.y));

    Ok(AffineMatrix { a, b, tx, c, d, ty })
}

/// Invert a forward matrix.
///
/// # Errors
///
/// [`GeometryError::SingularMatrix`] when the 2×2 linear block is degenerate.
pub fn invert_affine_matrix(m: &AffineMatrix) -> Result<AffineMatrix, GeometryError> {
    let det = m.determinant();
    if is_degenerate(det) {
        return Err(GeometryError::SingularMatrix { determinant: det });
    }

    let a = m.d / det;
    let b = -m.b / det;
    let c = -m.c / det;
    let d = m.a / det;

    Ok(AffineMatrix {
        a,
        b,
        tx: -(a * m.tx + b * m.ty),
        c,
        d,
        ty: -(c * m.tx + d * m.ty),
    })
}

// =============================================================================
// Bounds
// =============================================================================

/// Axis-aligned box in a target coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Smallest box enclosing `points`.
    ///
    /// Returns `None` for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Raster dimensions covering this box, at least 1×1.
    pub fn raster_size(&self) -> (u32, u32) {
        (raster_extent(self.width), raster_extent(self.height))
    }
}

fn raster_extent(value: f64) -> u32 {
    // `as` saturates, NaN maps to 0
    (value.ceil() as u32).max(1)
}

/// Where a `width × height` raster lands under `matrix`.
pub fn compute_transformed_bounds(width: u32, height: u32, matrix: &AffineMatrix) -> BoundingBox {
    let (w, h) = (f64::from(width), f64::from(height));
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    corners_bounds(corners.map(|p| matrix.apply(p)))
}

fn corners_bounds(corners: [Point; 4]) -> BoundingBox {
    let [p0, p1, p2, p3] = corners;
    let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
    let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
    let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
    let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
    BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

// =============================================================================
// Tests
// =============================================================================
