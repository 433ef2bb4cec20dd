//! Region properties of a (binarized) shape image.
//!
//! Conventions
//! - Pixel `(row, col)` has image coordinates `x = col`, `y = row`.
//! - Orientation is measured counter-clockwise from +x with y pointing *up*
//!   (i.e. against the row index), in `(-π/2, π/2]`. Isotropic blobs
//!   (disks) report 0.
//! - Axis lengths follow the second-moment ellipse: `4·sqrt(eigenvalue)`.

use super::ShapeImage;

/// Relative tolerance under which a blob's second moments count as isotropic.
const ISOTROPY_EPS: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionProps {
    /// Foreground pixel count.
    pub area: f64,
    /// Centroid column.
    pub x_center: f64,
    /// Centroid row.
    pub y_center: f64,
    /// Major-axis angle (rad).
    pub orientation: f64,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
}

impl RegionProps {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.area <= 0.0
    }

    #[inline]
    pub fn centroid(&self) -> (f64, f64) {
        (self.x_center, self.y_center)
    }
}

/// Geometric center of the pixel grid `(x, y)`.
#[inline]
pub fn image_center(img: &ShapeImage) -> (f64, f64) {
    let (rows, cols) = img.shape();
    (
        (cols.max(1) - 1) as f64 / 2.0,
        (rows.max(1) - 1) as f64 / 2.0,
    )
}

/// Properties of the foreground `value > thresh`.
///
/// All-background images yield area 0, the image center as centroid,
/// orientation 0 and zero axes; never NaN.
pub fn region_props(img: &ShapeImage, thresh: f64) -> RegionProps {
    let (rows, cols) = img.shape();
    let mut n = 0.0;
    let mut sum_r = 0.0;
    let mut sum_c = 0.0;
    for c in 0..cols {
        for r in 0..rows {
            if img[(r, c)] > thresh {
                n += 1.0;
                sum_r += r as f64;
                sum_c += c as f64;
            }
        }
    }
    if n == 0.0 {
        let (x_center, y_center) = image_center(img);
        return RegionProps {
            area: 0.0,
            x_center,
            y_center,
            orientation: 0.0,
            major_axis_length: 0.0,
            minor_axis_length: 0.0,
        };
    }
    let cr = sum_r / n;
    let cc = sum_c / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for c in 0..cols {
        for r in 0..rows {
            if img[(r, c)] > thresh {
                let dx = c as f64 - cc;
                let dy = -(r as f64 - cr);
                sxx += dx * dx;
                syy += dy * dy;
                sxy += dx * dy;
            }
        }
    }
    let (a, b, d) = (sxx / n, sxy / n, syy / n);
    let spread = a + d;
    let orientation = if (a - d).abs() <= ISOTROPY_EPS * spread && b.abs() <= ISOTROPY_EPS * spread
    {
        0.0
    } else {
        principal_angle(0.5 * (2.0 * b).atan2(a - d))
    };
    let mean = 0.5 * (a + d);
    let half_gap = (0.25 * (a - d) * (a - d) + b * b).sqrt();
    let l1 = mean + half_gap;
    let l2 = (mean - half_gap).max(0.0);
    RegionProps {
        area: n,
        x_center: cc,
        y_center: cr,
        orientation,
        major_axis_length: 4.0 * l1.sqrt(),
        minor_axis_length: 4.0 * l2.sqrt(),
    }
}

/// Map an axial angle into `(-π/2, π/2]`.
pub fn principal_angle(theta: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    let mut t = theta % PI;
    if t <= -FRAC_PI_2 {
        t += PI;
    } else if t > FRAC_PI_2 {
        t -= PI;
    }
    t
}

/// Mean of axial angles (defined modulo π), in `(-π/2, π/2]`.
///
/// Doubling the angles keeps e.g. +89° and -89° from averaging to 0°.
pub fn axial_mean(angles: &[f64]) -> f64 {
    if angles.is_empty() {
        return 0.0;
    }
    let (s, c) = angles
        .iter()
        .fold((0.0, 0.0), |(s, c), &t| (s + (2.0 * t).sin(), c + (2.0 * t).cos()));
    if s.abs() < 1e-12 && c.abs() < 1e-12 {
        return 0.0;
    }
    principal_angle(0.5 * s.atan2(c))
}
