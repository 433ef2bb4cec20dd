//! Resampling: bilinear lookup, similarity warps, integer shifts, resizing.
//!
//! Angles are in degrees, counter-clockwise with y pointing up (against the
//! row index), matching `props::region_props`.

use super::props::{image_center, region_props};
use super::ShapeImage;

/// Positions within this distance of the pixel grid are clamped onto it.
const EDGE_EPS: f64 = 1e-9;

/// Bilinear value at fractional `(row, col)`; zero outside the image.
pub fn bilinear(img: &ShapeImage, row: f64, col: f64) -> f64 {
    let (rows, cols) = img.shape();
    if rows == 0 || cols == 0 || !row.is_finite() || !col.is_finite() {
        return 0.0;
    }
    let max_r = (rows - 1) as f64;
    let max_c = (cols - 1) as f64;
    if row < -EDGE_EPS || col < -EDGE_EPS || row > max_r + EDGE_EPS || col > max_c + EDGE_EPS {
        return 0.0;
    }
    let row = row.clamp(0.0, max_r);
    let col = col.clamp(0.0, max_c);
    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);
    let fr = row - r0 as f64;
    let fc = col - c0 as f64;
    let top = img[(r0, c0)] * (1.0 - fc) + img[(r0, c1)] * fc;
    let bottom = img[(r1, c0)] * (1.0 - fc) + img[(r1, c1)] * fc;
    top * (1.0 - fr) + bottom * fr
}

/// Similarity warp: scale by `scale` and rotate by `angle_deg` about
/// `src_pivot`, placing that pivot at `dst_pivot` in the output. Pivots are
/// `(x, y)` = `(col, row)`. The output has the input's shape.
pub fn warp_similarity(
    img: &ShapeImage,
    src_pivot: (f64, f64),
    dst_pivot: (f64, f64),
    scale: f64,
    angle_deg: f64,
) -> ShapeImage {
    let (rows, cols) = img.shape();
    if !(scale.is_finite() && scale > 0.0) {
        return ShapeImage::zeros(rows, cols);
    }
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    ShapeImage::from_fn(rows, cols, |r, c| {
        let dc = c as f64 - dst_pivot.0;
        let dr = r as f64 - dst_pivot.1;
        // Inverse map of the y-up rotation written in row/col offsets.
        let sc = (dc * cos - dr * sin) / scale;
        let sr = (dc * sin + dr * cos) / scale;
        bilinear(img, src_pivot.1 + sr, src_pivot.0 + sc)
    })
}

/// Rotate about the foreground centroid (`value > 0`).
pub fn rotate(img: &ShapeImage, angle_deg: f64) -> ShapeImage {
    let pivot = region_props(img, 0.0).centroid();
    warp_similarity(img, pivot, pivot, 1.0, angle_deg)
}

/// Scale about the foreground centroid (`value > 0`).
pub fn scale_phosphene(img: &ShapeImage, scale: f64) -> ShapeImage {
    let pivot = region_props(img, 0.0).centroid();
    warp_similarity(img, pivot, pivot, scale, 0.0)
}

/// Translate by whole pixels; vacated pixels become zero.
pub fn shift(img: &ShapeImage, drow: i64, dcol: i64) -> ShapeImage {
    let (rows, cols) = img.shape();
    let mut out = ShapeImage::zeros(rows, cols);
    for c in 0..cols {
        let sc = c as i64 - dcol;
        if sc < 0 || sc >= cols as i64 {
            continue;
        }
        for r in 0..rows {
            let sr = r as i64 - drow;
            if sr < 0 || sr >= rows as i64 {
                continue;
            }
            out[(r, c)] = img[(sr as usize, sc as usize)];
        }
    }
    out
}

/// Move the foreground centroid (`value > 0`) onto `target` (`(x, y)`,
/// default the image center) by the nearest whole-pixel shift.
///
/// Blank images are returned unchanged.
pub fn center_phosphene(img: &ShapeImage, target: Option<(f64, f64)>) -> ShapeImage {
    let props = region_props(img, 0.0);
    if props.is_empty() {
        return img.clone();
    }
    let (tx, ty) = target.unwrap_or_else(|| image_center(img));
    let dcol = (tx - props.x_center).round() as i64;
    let drow = (ty - props.y_center).round() as i64;
    shift(img, drow, dcol)
}

/// Bilinear resize to `(rows, cols)`, aligning pixel centers.
pub fn resize(img: &ShapeImage, shape: (usize, usize)) -> ShapeImage {
    let (rows, cols) = shape;
    let (in_rows, in_cols) = img.shape();
    if (rows, cols) == (in_rows, in_cols) {
        return img.clone();
    }
    if in_rows == 0 || in_cols == 0 {
        return ShapeImage::zeros(rows, cols);
    }
    let sy = in_rows as f64 / rows.max(1) as f64;
    let sx = in_cols as f64 / cols.max(1) as f64;
    let max_r = (in_rows - 1) as f64;
    let max_c = (in_cols - 1) as f64;
    ShapeImage::from_fn(rows, cols, |r, c| {
        let sr = ((r as f64 + 0.5) * sy - 0.5).clamp(0.0, max_r);
        let sc = ((c as f64 + 0.5) * sx - 0.5).clamp(0.0, max_c);
        bilinear(img, sr, sc)
    })
}
