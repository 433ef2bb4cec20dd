//! Image primitives for phosphene shapes.
//!
//! Purpose
//! - Everything registration and aggregation need on 2-D images: region
//!   properties, thresholding, similarity warps, recentering and overlap.
//!
//! Why this design
//! - Images are plain `nalgebra::DMatrix<f64>` (`ShapeImage`), indexed
//!   `(row, col)`; binary masks use `0.0`/`1.0`.
//! - Functions are pure and return new images; no in-place mutation of inputs.
//! - Degenerate inputs (blank images) yield defined finite values instead of
//!   NaN so callers can decide how to report them.
//!
//! Code cross-refs: `crate::srd` (registration), `crate::aggregate`.

mod props;
mod threshold;
mod warp;

use nalgebra::DMatrix;

use crate::error::{PhospheneError, Result};

pub use props::{axial_mean, image_center, principal_angle, region_props, RegionProps};
pub use threshold::{binarize, binarize_otsu, otsu_threshold, thresholded_image, Threshold};
pub use warp::{
    bilinear, center_phosphene, resize, rotate, scale_phosphene, shift, warp_similarity,
};

/// 2-D grayscale or binary image, indexed `(row, col)`.
pub type ShapeImage = DMatrix<f64>;

/// Reject images whose shapes differ.
pub(crate) fn ensure_same_shape(a: &ShapeImage, b: &ShapeImage, what: &str) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(PhospheneError::shape(format!(
            "{what}: image shapes differ, {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}

/// Dice overlap of the foregrounds `value > thresh`.
///
/// Two blank masks are identical and score 1.
pub fn dice_coefficient(a: &ShapeImage, b: &ShapeImage, thresh: f64) -> Result<f64> {
    ensure_same_shape(a, b, "dice")?;
    let (mut na, mut nb, mut both) = (0usize, 0usize, 0usize);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (fa, fb) = (x > thresh, y > thresh);
        na += fa as usize;
        nb += fb as usize;
        both += (fa && fb) as usize;
    }
    if na + nb == 0 {
        return Ok(1.0);
    }
    Ok(2.0 * both as f64 / (na + nb) as f64)
}
