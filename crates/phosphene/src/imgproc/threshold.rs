//! Fixed and automatic (Otsu) thresholding.

use super::{resize, ShapeImage};

/// Histogram resolution used by Otsu's method.
const OTSU_BINS: usize = 256;

/// Threshold rule for binarizing an image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Threshold {
    /// Foreground is `value > t`.
    Fixed(f64),
    /// Otsu's between-class-variance threshold.
    Otsu,
}

/// `1.0` where `value > thresh`, else `0.0`.
pub fn binarize(img: &ShapeImage, thresh: f64) -> ShapeImage {
    img.map(|v| if v > thresh { 1.0 } else { 0.0 })
}

/// Otsu threshold on a 256-bin histogram spanning `[min, max]`.
///
/// Returns the center of the last bin of the lower class, or `None` for a
/// constant (or empty) image where no split exists.
pub fn otsu_threshold(img: &ShapeImage) -> Option<f64> {
    let (min, max) = img
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(max > min) {
        return None;
    }
    let width = (max - min) / OTSU_BINS as f64;
    let mut hist = [0.0f64; OTSU_BINS];
    for &v in img.iter().filter(|v| v.is_finite()) {
        let idx = (((v - min) / width) as usize).min(OTSU_BINS - 1);
        hist[idx] += 1.0;
    }
    let total: f64 = hist.iter().sum();
    let sum_all: f64 = hist.iter().enumerate().map(|(i, h)| i as f64 * h).sum();

    let mut w0 = 0.0;
    let mut sum0 = 0.0;
    let mut best_var = f64::NEG_INFINITY;
    let mut best_k = 0usize;
    for (k, &h) in hist.iter().enumerate().take(OTSU_BINS - 1) {
        w0 += h;
        sum0 += k as f64 * h;
        if w0 == 0.0 {
            continue;
        }
        let w1 = total - w0;
        if w1 == 0.0 {
            break;
        }
        let m0 = sum0 / w0;
        let m1 = (sum_all - sum0) / w1;
        let var = w0 * w1 * (m0 - m1) * (m0 - m1);
        if var > best_var {
            best_var = var;
            best_k = k;
        }
    }
    Some(min + (best_k as f64 + 0.5) * width)
}

/// Binarize with Otsu's threshold; a constant image binarizes to `value > 0`.
pub fn binarize_otsu(img: &ShapeImage) -> ShapeImage {
    binarize(img, otsu_threshold(img).unwrap_or(0.0))
}

/// Optionally resize to `out_shape`, then binarize.
pub fn thresholded_image(
    img: &ShapeImage,
    rule: Threshold,
    out_shape: Option<(usize, usize)>,
) -> ShapeImage {
    let resized;
    let src = match out_shape {
        Some(shape) if shape != img.shape() => {
            resized = resize(img, shape);
            &resized
        }
        _ => img,
    };
    match rule {
        Threshold::Fixed(t) => binarize(src, t),
        Threshold::Otsu => binarize_otsu(src),
    }
}
