//! Scale/rotation/Dice shape comparison (SRD).
//!
//! Purpose
//! - Register a candidate shape onto a reference with one uniform scale and one
//!   rotation, then score the registration: how much scaling was needed, how
//!   far it had to turn, and how well the two overlap afterwards.
//!
//! Algorithm
//! - Region properties of both images (foreground `> 0`).
//! - `scale = sqrt(area_ref / area_cand)`.
//! - Orientation is axial, so the rotation is ambiguous by 180°: both
//!   `θ = orient_ref − orient_cand` and `θ + 180°` are applied (scale and
//!   rotate about the candidate centroid, centroid moved onto the reference
//!   centroid) and scored by Dice at 0.5. Larger Dice wins; ties go to the
//!   smaller `|angle|`.
//! - `loss = w_scale·(1 − min(s, 1/s)) + w_rot·|angle|/180 + w_dice·(1 − dice)`.
//!
//! Degenerate input: a blank reference or candidate scores the maximal
//! penalty and reports `Degeneracy::EmptyImage`; never NaN.
//!
//! Code cross-refs: `crate::aggregate::aggregate_registered`,
//! `crate::model::SpatialModel::score`.

use crate::error::{Degeneracy, PhospheneError, Result};
use crate::imgproc::{
    binarize, dice_coefficient, ensure_same_shape, region_props, warp_similarity, RegionProps,
    ShapeImage,
};
use crate::parallel::Executor;

/// Dice values closer than this are a tie.
const DICE_TIE_EPS: f64 = 1e-9;

/// Relative weights of the three loss terms.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SrdWeights {
    pub w_scale: f64,
    pub w_rot: f64,
    pub w_dice: f64,
}

impl Default for SrdWeights {
    fn default() -> Self {
        Self {
            w_scale: 34.0,
            w_rot: 33.0,
            w_dice: 34.0,
        }
    }
}

impl SrdWeights {
    /// Maximal loss.
    #[inline]
    pub fn total(&self) -> f64 {
        self.w_scale + self.w_rot + self.w_dice
    }

    pub fn validate(&self) -> Result<()> {
        for (what, w) in [
            ("w_scale", self.w_scale),
            ("w_rot", self.w_rot),
            ("w_dice", self.w_dice),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(PhospheneError::config(format!(
                    "{what} must be finite and non-negative, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of registering a candidate onto a reference.
///
/// Invariants: `scale > 0`, `angle ∈ (-180, 180]` (degrees), `dice ∈ [0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentParams {
    pub scale: f64,
    pub angle: f64,
    pub dice: f64,
}

impl AlignmentParams {
    /// Registration of degenerate inputs.
    pub const DEGENERATE: AlignmentParams = AlignmentParams {
        scale: 1.0,
        angle: 0.0,
        dice: 0.0,
    };

    /// Weighted loss of these parameters.
    pub fn loss(&self, w: &SrdWeights) -> f64 {
        let s = self.scale;
        w.w_scale * (1.0 - s.min(1.0 / s))
            + w.w_rot * self.angle.abs() / 180.0
            + w.w_dice * (1.0 - self.dice.clamp(0.0, 1.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub params: AlignmentParams,
    /// Set when either image was blank.
    pub degenerate: Option<Degeneracy>,
}

impl Registration {
    pub fn loss(&self, w: &SrdWeights) -> f64 {
        if self.degenerate.is_some() {
            w.total()
        } else {
            self.params.loss(w)
        }
    }
}

/// Wrap degrees into `(-180, 180]`.
pub fn wrap_degrees(a: f64) -> f64 {
    let mut w = a % 360.0;
    if w <= -180.0 {
        w += 360.0;
    } else if w > 180.0 {
        w -= 360.0;
    }
    w
}

/// Pick the `(angle, dice)` with the largest Dice, ties to the smaller `|angle|`.
fn select_angle(candidates: &[(f64, f64)]) -> (f64, f64) {
    candidates
        .iter()
        .copied()
        .reduce(|best, next| {
            let better = next.1 > best.1 + DICE_TIE_EPS;
            let tie = (next.1 - best.1).abs() <= DICE_TIE_EPS;
            if better || (tie && next.0.abs() < best.0.abs()) {
                next
            } else {
                best
            }
        })
        .unwrap_or((0.0, 0.0))
}

/// Apply a registration to `candidate`: scale and rotate about its centroid
/// and move the centroid onto `reference_centroid` (`(x, y)`).
pub fn apply_alignment(
    candidate: &ShapeImage,
    candidate_props: &RegionProps,
    reference_centroid: (f64, f64),
    scale: f64,
    angle_deg: f64,
) -> ShapeImage {
    warp_similarity(
        candidate,
        candidate_props.centroid(),
        reference_centroid,
        scale,
        angle_deg,
    )
}

/// Register `candidate` onto `reference`.
pub fn align(reference: &ShapeImage, candidate: &ShapeImage) -> Result<Registration> {
    ensure_same_shape(reference, candidate, "registration")?;
    let pr = region_props(reference, 0.0);
    let pc = region_props(candidate, 0.0);
    if pr.is_empty() || pc.is_empty() {
        return Ok(Registration {
            params: AlignmentParams::DEGENERATE,
            degenerate: Some(Degeneracy::EmptyImage {
                context: "registration",
            }
            .report()),
        });
    }
    let scale = (pr.area / pc.area).sqrt();
    let theta = (pr.orientation - pc.orientation).to_degrees();
    let ref_mask = binarize(reference, 0.0);
    let cand_mask = binarize(candidate, 0.0);
    let mut scored = Vec::with_capacity(2);
    for angle in [wrap_degrees(theta), wrap_degrees(theta + 180.0)] {
        let warped = apply_alignment(&cand_mask, &pc, pr.centroid(), scale, angle);
        scored.push((angle, dice_coefficient(&ref_mask, &warped, 0.5)?));
    }
    let (angle, dice) = select_angle(&scored);
    Ok(Registration {
        params: AlignmentParams { scale, angle, dice },
        degenerate: None,
    })
}

/// SRD loss in `[0, weights.total()]`.
pub fn srd_loss(reference: &ShapeImage, candidate: &ShapeImage, weights: &SrdWeights) -> Result<f64> {
    Ok(align(reference, candidate)?.loss(weights))
}

/// Scoring capability injected into a model.
pub trait LossStrategy: Send + Sync {
    fn loss(&self, target: &ShapeImage, predicted: &ShapeImage) -> Result<f64>;
}

/// SRD loss with fixed weights.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SrdLoss {
    pub weights: SrdWeights,
}

impl SrdLoss {
    pub fn new(weights: SrdWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }
}

impl LossStrategy for SrdLoss {
    fn loss(&self, target: &ShapeImage, predicted: &ShapeImage) -> Result<f64> {
        srd_loss(target, predicted, &self.weights)
    }
}

/// Loss of every `(target, predicted)` pair, in order, on `exec`.
pub fn loss_batch<L: LossStrategy + ?Sized>(
    strategy: &L,
    pairs: &[(&ShapeImage, &ShapeImage)],
    exec: &Executor,
) -> Result<Vec<f64>> {
    exec.map(pairs, |(target, predicted)| strategy.loss(target, predicted))
}
