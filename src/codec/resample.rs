//! Affine resampling and aspect-preserving resize.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::CodecError;
use crate::geometry::{AffineMatrix, BoundingBox};

/// Largest destination raster [`affine_resample`] will allocate, in pixels.
///
/// 2³¹ RGBA pixels is 8 GiB, roughly a 46 000 × 46 000 canvas.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 31;

/// Inverse mapping from destination pixels to source pixels.
///
/// Destination pixel `(ox, oy)` samples the source at
/// `(a·ox + b·oy + offset_x, c·ox + d·oy + offset_y)`. The offset folds the
/// bounding-box origin into the inverse translation, so the destination
/// canvas starts at its own `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl ResampleParams {
    /// Drive a resample of the box `bounds` (in parent space) through
    /// `inverse` (parent to overlay).
    pub fn for_bounds(inverse: &AffineMatrix, bounds: &BoundingBox) -> Self {
        Self {
            a: inverse.a,
            b: inverse.b,
            c: inverse.c,
            d: inverse.d,
            offset_x: inverse.a * bounds.min_x + inverse.b * bounds.min_y + inverse.tx,
            offset_y: inverse.c * bounds.min_x + inverse.d * bounds.min_y + inverse.ty,
        }
    }

    /// Source position sampled by destination pixel `(ox, oy)`.
    #[inline]
    pub fn source_position(&self, ox: f64, oy: f64) -> (f64, f64) {
        (
            self.a * ox + self.b * oy + self.offset_x,
            self.c * ox + self.d * oy + self.offset_y,
        )
    }
}

// =============================================================================
// Bilinear affine resample
// =============================================================================

/// Produce a `width × height` raster by inverse-mapping every pixel into
/// `source`.
///
/// Interpolation is bilinear on premultiplied alpha, so transparent source
/// pixels do not bleed dark fringes. Taps outside the source contribute
/// nothing; a destination pixel with no coverage is transparent black.
///
/// Canvases above [`MAX_OUTPUT_PIXELS`], or that the allocator refuses, are
/// a [`CodecError::Resample`] rather than an abort.
pub fn affine_resample(
    source: &RgbaImage,
    params: &ResampleParams,
    width: u32,
    height: u32,
) -> Result<RgbaImage, CodecError> {
    let too_large =
        || CodecError::Resample(format!("output raster {}x{} is too large", width, height));

    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_OUTPUT_PIXELS {
        return Err(too_large());
    }
    let len = usize::try_from(pixels)
        .ok()
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(too_large)?;

    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|e| {
        CodecError::Resample(format!(
            "cannot allocate {}x{} output raster: {}",
            width, height, e
        ))
    })?;
    out.resize(len, 0);

    if width > 0 && source.width() > 0 && source.height() > 0 {
        for (oy, row) in out.chunks_exact_mut(width as usize * 4).enumerate() {
            for (ox, px) in row.chunks_exact_mut(4).enumerate() {
                let (sx, sy) = params.source_position(ox as f64, oy as f64);
                if let Some(sample) = sample_bilinear(source, sx, sy) {
                    px.copy_from_slice(&sample);
                }
            }
        }
    }

    RgbaImage::from_raw(width, height, out)
        .ok_or_else(|| CodecError::Resample("output buffer size mismatch".to_string()))
}

fn sample_bilinear(source: &RgbaImage, x: f64, y: f64) -> Option<[u8; 4]> {
    let (w, h) = (source.width() as i64, source.height() as i64);

    // Written this way round so NaN falls through to `None`
    if !(x > -1.0 && y > -1.0 && x < w as f64 && y < h as f64) {
        return None;
    }

    let (fx0, fy0) = (x.floor(), y.floor());
    let (fx, fy) = (x - fx0, y - fy0);
    let (x0, y0) = (fx0 as i64, fy0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut premultiplied = [0.0f64; 3];
    let mut alpha = 0.0f64;
    for (px, py, weight) in taps {
        if weight <= 0.0 || px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let [r, g, b, a] = source.get_pixel(px as u32, py as u32).0;
        let covered = f64::from(a) * weight;
        premultiplied[0] += f64::from(r) * covered;
        premultiplied[1] += f64::from(g) * covered;
        premultiplied[2] += f64::from(b) * covered;
        alpha += covered;
    }

    let alpha_byte = alpha.round().min(255.0) as u8;
    if alpha_byte == 0 {
        return None;
    }

    let channel = |sum: f64| (sum / alpha).round().clamp(0.0, 255.0) as u8;
    Some([
        channel(premultiplied[0]),
        channel(premultiplied[1]),
        channel(premultiplied[2]),
        alpha_byte,
    ])
}

// =============================================================================
// Resize inside
// =============================================================================

/// Dimensions of `width × height` scaled to fit inside a `size × size` box.
///
/// Aspect ratio is preserved and the longer edge becomes `size`. Rasters
/// already inside the box keep their dimensions.
pub fn fit_inside(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width <= size && height <= size {
        return (width, height);
    }
    let scale = f64::from(size) / f64::from(width.max(height));
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, size);
    (scaled(width), scaled(height))
}

/// Resize `image` to fit inside a `size × size` box. See [`fit_inside`].
pub fn resize_inside(image: &RgbaImage, size: u32) -> RgbaImage {
    let (width, height) = fit_inside(image.width(), image.height(), size);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

// =============================================================================
// Tests
// =============================================================================
