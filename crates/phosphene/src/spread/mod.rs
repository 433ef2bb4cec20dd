//! Current-spread maps: one non-negative field per electrode over a retinal grid.
//!
//! Purpose
//! - Produce the per-electrode field every prediction is built from, and keep
//!   it cached by canonical electrode name for the lifetime of a grid.
//!
//! Why this design
//! - One capability (`CurrentSpread`) with interchangeable implementations
//!   (`Scoreboard`, `Gaussian`, `Anatomical`) chosen at construction, instead
//!   of a mode string checked on every call.
//! - `Anatomical` delegates to an `AxonalPhysiology` collaborator; the crate
//!   ships `AhujaSpread` as a default.
//! - Caching and multi-electrode summation live in `cache` and `stimulus`.
//!
//! Code cross-refs: `crate::model` (fit/predict), `crate::simulation`.

mod cache;
mod stimulus;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::{PhospheneError, Result};
use crate::geom::RetinalGrid;
use crate::implant::Electrode;

pub use cache::CurrentMapCache;
pub use stimulus::{stimulus_field, StimulusField};

/// Field over a `RetinalGrid`; same shape as the grid.
pub type CurrentMap = DMatrix<f64>;

/// Produces the field of one electrode over a grid.
pub trait CurrentSpread: Send + Sync + fmt::Debug {
    fn map_for(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap>;
}

fn gaussian_field(electrode: &Electrode, grid: &RetinalGrid, sigma: f64) -> CurrentMap {
    let two_s2 = 2.0 * sigma * sigma;
    let (cx, cy) = (electrode.center.x, electrode.center.y);
    grid.xret.zip_map(&grid.yret, |x, y| {
        let d2 = (x - cx) * (x - cx) + (y - cy) * (y - cy);
        (-d2 / two_s2).exp()
    })
}

fn positive(what: &str, v: f64) -> Result<f64> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(PhospheneError::config(format!("{what} must be positive, got {v}")))
    }
}

/// `exp(-d² / 2ρ²)` with the fitted radius `ρ` (µm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scoreboard {
    rho: f64,
}

impl Scoreboard {
    pub fn new(rho: f64) -> Result<Self> {
        Ok(Self {
            rho: positive("rho", rho)?,
        })
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }
}

impl CurrentSpread for Scoreboard {
    fn map_for(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        Ok(gaussian_field(electrode, grid, self.rho))
    }
}

/// Same fall-off as `Scoreboard` with a directly supplied width (µm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gaussian {
    width: f64,
}

impl Gaussian {
    pub fn new(width: f64) -> Result<Self> {
        Ok(Self {
            width: positive("current-spread width", width)?,
        })
    }
}

impl CurrentSpread for Gaussian {
    fn map_for(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        Ok(gaussian_field(electrode, grid, self.width))
    }
}

/// Axonal-physiology collaborator behind `Anatomical`.
pub trait AxonalPhysiology: Send + Sync + fmt::Debug {
    /// Raw spread on the optic-fiber layer.
    fn current_spread(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap>;

    /// Whether `effective_current` is implemented.
    fn provides_effective_current(&self) -> bool {
        false
    }

    /// Convert raw spread into effective current (axonal integration).
    fn effective_current(&self, _spread: &CurrentMap, _grid: &RetinalGrid) -> Result<CurrentMap> {
        Err(PhospheneError::UnsupportedConfiguration {
            reason: "this physiology has no effective-current conversion".into(),
        })
    }
}

/// Disk electrode with `α / (α + (r − radius)ⁿ)` fall-off outside the disk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AhujaSpread {
    pub alpha: f64,
    pub n: f64,
}

impl Default for AhujaSpread {
    fn default() -> Self {
        Self {
            alpha: 14000.0,
            n: 1.69,
        }
    }
}

impl AxonalPhysiology for AhujaSpread {
    fn current_spread(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        let (cx, cy) = (electrode.center.x, electrode.center.y);
        Ok(grid.xret.zip_map(&grid.yret, |x, y| {
            let r = ((x - cx) * (x - cx) + (y - cy) * (y - cy)).sqrt();
            if r <= electrode.radius {
                1.0
            } else {
                self.alpha / (self.alpha + (r - electrode.radius).powf(self.n))
            }
        }))
    }
}

/// Spread computed by an axonal-physiology collaborator.
#[derive(Clone, Debug)]
pub struct Anatomical {
    physiology: Arc<dyn AxonalPhysiology>,
    use_ofl: bool,
}

impl Anatomical {
    /// `use_ofl` requires a physiology with an effective-current conversion.
    pub fn new(physiology: Arc<dyn AxonalPhysiology>, use_ofl: bool) -> Result<Self> {
        if use_ofl && !physiology.provides_effective_current() {
            return Err(PhospheneError::config(format!(
                "use_ofl requested but {physiology:?} has no effective-current conversion"
            )));
        }
        Ok(Self {
            physiology,
            use_ofl,
        })
    }
}

impl CurrentSpread for Anatomical {
    fn map_for(&self, electrode: &Electrode, grid: &RetinalGrid) -> Result<CurrentMap> {
        let raw = self.physiology.current_spread(electrode, grid)?;
        if self.use_ofl {
            self.physiology.effective_current(&raw, grid)
        } else {
            Ok(raw)
        }
    }
}

/// Spread model selectable by name (`"scoreboard"`, `"gaussian"`, `"ahuja"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SpreadKind {
    Scoreboard,
    Gaussian,
    Ahuja,
}

impl FromStr for SpreadKind {
    type Err = PhospheneError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scoreboard" => Ok(SpreadKind::Scoreboard),
            "gaussian" => Ok(SpreadKind::Gaussian),
            "ahuja" => Ok(SpreadKind::Ahuja),
            _ => Err(PhospheneError::config(format!("unknown spread model '{s}'"))),
        }
    }
}

impl SpreadKind {
    /// Instantiate; `width` is ρ or the Gaussian width (µm) and is ignored by
    /// `Ahuja`, `use_ofl` only applies to `Ahuja`.
    pub fn build(self, width: f64, use_ofl: bool) -> Result<Arc<dyn CurrentSpread>> {
        Ok(match self {
            SpreadKind::Scoreboard => Arc::new(Scoreboard::new(width)?),
            SpreadKind::Gaussian => Arc::new(Gaussian::new(width)?),
            SpreadKind::Ahuja => Arc::new(Anatomical::new(Arc::new(AhujaSpread::default()), use_ofl)?),
        })
    }
}

#[cfg(test)]
mod tests;
