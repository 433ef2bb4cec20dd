//! Visual field → retina transform with radial ganglion-cell displacement.
//!
//! Model
//! - Work in polar form. The radial displacement is a fixed closed-form curve
//!   (gamma-pdf shaped fall-off) whose constants depend on the meridian.
//! - Meridian by sign of x: `x < 0` temporal, else nasal. This approximates
//!   the true nasal/temporal split of the retina and is kept for output
//!   compatibility.
//! - Displaced radius `r + d(r)` goes back to Cartesian and is scaled by a
//!   linear retinal magnification of 280 µm/dva.
//!
//! Inverse
//! - No closed form. We tabulate `r ↦ r + d(r)` over `[0, 30)` dva at 0.1 dva
//!   steps per meridian and invert by linear interpolation on the (monotonic)
//!   table. Outside the tabulated range the inverse is undefined (`None`).

use super::types::{Eye, RetinalPoint, VisualFieldPoint};
use crate::error::{PhospheneError, Result};

/// Linear retinal magnification (µm per dva).
pub const RET_PER_DVA: f64 = 280.0;

/// Upper end (exclusive) of the tabulated radius range for the inverse, dva.
pub const INVERSE_MAX_DVA: f64 = 30.0;
/// Sampling step of the inverse table, dva.
pub const INVERSE_STEP_DVA: f64 = 0.1;

#[inline]
pub fn dva2ret(dva: f64) -> f64 {
    dva * RET_PER_DVA
}

#[inline]
pub fn ret2dva(ret: f64) -> f64 {
    ret / RET_PER_DVA
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Meridian {
    Temporal,
    Nasal,
}

impl Meridian {
    /// Classify by sign of x; the boundary `x = 0` is nasal.
    #[inline]
    pub fn of_x(x: f64) -> Self {
        if x < 0.0 {
            Meridian::Temporal
        } else {
            Meridian::Nasal
        }
    }
}

/// Constants of the displacement curve for one meridian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacementCurve {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub mu: f64,
    pub scale: f64,
}

impl DisplacementCurve {
    pub const TEMPORAL: Self = Self {
        alpha: 1.8938,
        beta: 2.4598,
        gamma: 0.91565,
        delta: 14.904,
        mu: -0.09386,
        scale: 12.0,
    };

    pub const NASAL: Self = Self {
        alpha: 2.4607,
        beta: 1.7463,
        gamma: 0.77754,
        delta: 15.111,
        mu: -0.15933,
        scale: 10.0,
    };

    #[inline]
    pub fn for_meridian(meridian: Meridian) -> Self {
        match meridian {
            Meridian::Temporal => Self::TEMPORAL,
            Meridian::Nasal => Self::NASAL,
        }
    }

    /// Radial displacement (dva) at eccentricity `r` (dva).
    pub fn eval(&self, r: f64) -> f64 {
        let rmubeta = (r.abs() - self.mu) / self.beta;
        let numer = self.delta
            * self.gamma
            * (-rmubeta.powf(self.gamma)).exp()
            * rmubeta.powf(self.alpha * self.gamma - 1.0);
        let denom = self.beta * gamma_pdf_shape5(self.alpha);
        numer / denom / self.scale
    }
}

/// Gamma density with shape 5 and unit scale, `x⁴ e^{-x} / Γ(5)`.
#[inline]
fn gamma_pdf_shape5(x: f64) -> f64 {
    const GAMMA_5: f64 = 24.0;
    if x < 0.0 {
        return 0.0;
    }
    x.powi(4) * (-x).exp() / GAMMA_5
}

/// Radial displacement (dva) at eccentricity `r` on the given meridian.
#[inline]
pub fn calc_displacement(r: f64, meridian: Meridian) -> f64 {
    DisplacementCurve::for_meridian(meridian).eval(r)
}

fn require_right_eye(eye: Eye) -> Result<()> {
    match eye {
        Eye::Right => Ok(()),
        Eye::Left => Err(PhospheneError::UnsupportedConfiguration {
            reason: "the displacement model is only defined for the right eye".into(),
        }),
    }
}

/// Batched forward transform: visual field (dva) → displaced retina (µm).
pub fn to_retinal(points: &[VisualFieldPoint], eye: Eye) -> Result<Vec<RetinalPoint>> {
    require_right_eye(eye)?;
    Ok(points
        .iter()
        .map(|p| {
            let (theta, rho) = p.polar();
            let rho = rho + calc_displacement(rho, Meridian::of_x(p.x));
            RetinalPoint::new(dva2ret(rho * theta.cos()), dva2ret(rho * theta.sin()))
        })
        .collect())
}

/// Monotonic lookup table `xs → ys` with linear interpolation, no extrapolation.
#[derive(Clone, Debug)]
struct InterpTable {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl InterpTable {
    fn sample(curve: DisplacementCurve) -> Self {
        let n = (INVERSE_MAX_DVA / INVERSE_STEP_DVA).round() as usize;
        let ys: Vec<f64> = (0..n).map(|i| i as f64 * INVERSE_STEP_DVA).collect();
        let xs: Vec<f64> = ys.iter().map(|&r| r + curve.eval(r)).collect();
        debug_assert!(
            xs.windows(2).all(|w| w[0] < w[1]),
            "displaced radius must be strictly increasing"
        );
        Self { xs, ys }
    }

    fn range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    fn eval(&self, x: f64) -> Option<f64> {
        let (lo, hi) = self.range();
        if !x.is_finite() || x < lo || x > hi {
            return None;
        }
        // First index whose value exceeds x; >= 1 because xs[0] <= x.
        let idx = self.xs.partition_point(|&v| v <= x);
        if idx == self.xs.len() {
            return self.ys.last().copied();
        }
        let i = idx - 1;
        let t = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        Some(self.ys[i] + t * (self.ys[i + 1] - self.ys[i]))
    }
}

/// Sampled inverse of the displacement transform.
#[derive(Clone, Debug)]
pub struct InverseDisplacement {
    temporal: InterpTable,
    nasal: InterpTable,
}

impl Default for InverseDisplacement {
    fn default() -> Self {
        Self::new()
    }
}

impl InverseDisplacement {
    pub fn new() -> Self {
        Self {
            temporal: InterpTable::sample(DisplacementCurve::TEMPORAL),
            nasal: InterpTable::sample(DisplacementCurve::NASAL),
        }
    }

    fn table(&self, meridian: Meridian) -> &InterpTable {
        match meridian {
            Meridian::Temporal => &self.temporal,
            Meridian::Nasal => &self.nasal,
        }
    }

    /// Range of displaced radii (dva) the table can invert.
    pub fn displaced_range(&self, meridian: Meridian) -> (f64, f64) {
        self.table(meridian).range()
    }

    /// Undisplaced eccentricity for a displaced eccentricity (both dva).
    pub fn radius(&self, displaced: f64, meridian: Meridian) -> Option<f64> {
        self.table(meridian).eval(displaced)
    }

    /// Batched inverse: displaced retina (µm) → visual field (dva).
    ///
    /// Points whose radius falls outside the tabulated range map to `None`.
    pub fn to_visual(
        &self,
        points: &[RetinalPoint],
        eye: Eye,
    ) -> Result<Vec<Option<VisualFieldPoint>>> {
        require_right_eye(eye)?;
        Ok(points
            .iter()
            .map(|p| {
                let v = VisualFieldPoint::new(ret2dva(p.x), ret2dva(p.y));
                let (theta, rho) = v.polar();
                self.radius(rho, Meridian::of_x(v.x))
                    .map(|r| VisualFieldPoint::new(r * theta.cos(), r * theta.sin()))
            })
            .collect())
    }
}
