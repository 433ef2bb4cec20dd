//! Synthetic phosphene drawings (rasterized ellipses + replay tokens).
//!
//! Purpose
//! - Deterministic stand-ins for patient drawings: tests, benchmarks and the
//!   demo binary draw ellipses with bounded jitter in position, size and
//!   orientation, indexed by a replay token so any single trial can be
//!   regenerated without drawing the ones before it.
//!
//! Model
//! - `EllipseSpec` is in pixel units with y pointing up (orientation is
//!   counter-clockwise from +x), the same frame `imgproc::region_props` reports.
//! - `ReplayToken(seed, index)` is mixed into one `StdRng` per trial.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::imgproc::ShapeImage;

/// Filled ellipse in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseSpec {
    /// Center `(x, y)` = `(col, row)`.
    pub center: (f64, f64),
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Major-axis angle (rad), counter-clockwise, y up.
    pub orientation: f64,
}

impl EllipseSpec {
    pub fn disk(center: (f64, f64), radius: f64) -> Self {
        Self {
            center,
            semi_major: radius,
            semi_minor: radius,
            orientation: 0.0,
        }
    }
}

/// Rasterize `spec` into a binary image of `shape = (rows, cols)`.
pub fn draw_ellipse(shape: (usize, usize), spec: EllipseSpec) -> ShapeImage {
    let (rows, cols) = shape;
    let (sin, cos) = spec.orientation.sin_cos();
    let a = spec.semi_major.max(1e-12);
    let b = spec.semi_minor.max(1e-12);
    ShapeImage::from_fn(rows, cols, |r, c| {
        let dx = c as f64 - spec.center.0;
        let dy = -(r as f64 - spec.center.1);
        let u = (dx * cos + dy * sin) / a;
        let v = (-dx * sin + dy * cos) / b;
        if u * u + v * v <= 1.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// Rasterize a disk.
pub fn draw_disk(shape: (usize, usize), center: (f64, f64), radius: f64) -> ShapeImage {
    draw_ellipse(shape, EllipseSpec::disk(center, radius))
}

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    pub fn new(seed: u64, index: u64) -> Self {
        Self { seed, index }
    }

    #[inline]
    fn to_std_rng(self) -> StdRng {
        // SplitMix64 finalizer.
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

/// Bounded trial-to-trial variation around a base ellipse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialJitter {
    /// Max center offset per axis (px).
    pub shift_px: f64,
    /// Relative size jitter; axes scale by `1 + u`, `u ∈ [-scale_frac, scale_frac]`.
    pub scale_frac: f64,
    /// Max orientation offset (rad).
    pub angle_rad: f64,
}

impl Default for TrialJitter {
    fn default() -> Self {
        Self {
            shift_px: 3.0,
            scale_frac: 0.1,
            angle_rad: 0.15,
        }
    }
}

/// Draw one jittered trial of `base`.
pub fn draw_trial(
    shape: (usize, usize),
    base: EllipseSpec,
    jitter: TrialJitter,
    tok: ReplayToken,
) -> ShapeImage {
    let mut rng = tok.to_std_rng();
    let mut sym = |amp: f64| (rng.gen::<f64>() * 2.0 - 1.0) * amp.max(0.0);
    let dx = sym(jitter.shift_px);
    let dy = sym(jitter.shift_px);
    let s = (1.0 + sym(jitter.scale_frac)).max(1e-3);
    let dtheta = sym(jitter.angle_rad);
    draw_ellipse(
        shape,
        EllipseSpec {
            center: (base.center.0 + dx, base.center.1 + dy),
            semi_major: base.semi_major * s,
            semi_minor: base.semi_minor * s,
            orientation: base.orientation + dtheta,
        },
    )
}

/// Draw `n` trials with indices `0..n` under `seed`.
pub fn draw_trials(
    shape: (usize, usize),
    base: EllipseSpec,
    jitter: TrialJitter,
    seed: u64,
    n: usize,
) -> Vec<ShapeImage> {
    (0..n as u64)
        .map(|index| draw_trial(shape, base, jitter, ReplayToken::new(seed, index)))
        .collect()
}
