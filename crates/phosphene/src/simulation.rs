//! Stimulus-level percept simulation on a retinal patch.
//!
//! Purpose
//! - Simulate the percept of one stimulus (`"A1"`, `"A1_B2"`) at a given
//!   amplitude: per-electrode spread on a µm patch of the retina, summed and
//!   scaled to the amplitude, optionally warped from retinal into visual-field
//!   coordinates through the inverse displacement.
//!
//! Notes
//! - The spread model is picked by name at construction (`SpreadKind`).
//! - Maps are cached per canonical electrode; changing the spread model clears
//!   the cache.
//! - Output pixels whose inverse displacement is undefined (very close to
//!   the fovea or beyond the tabulated range) stay 0.

use std::sync::Arc;

use crate::error::{Degeneracy, PhospheneError, Result};
use crate::geom::{
    dva2ret, linspace, ret2dva, Eye, GridCfg, InverseDisplacement, Meridian, RetinalGrid,
};
use crate::imgproc::{bilinear, ShapeImage};
use crate::implant::{parse_stimulus, ElectrodeArray, ElectrodeName, ImplantCfg};
use crate::parallel::{Executor, ParallelCfg};
use crate::spread::{stimulus_field, CurrentMapCache, CurrentSpread, SpreadKind};

/// Rectangular patch of the retinal surface (µm).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetinaPatch {
    pub xrange: (f64, f64),
    pub yrange: (f64, f64),
    pub step: f64,
}

impl Default for RetinaPatch {
    fn default() -> Self {
        Self {
            xrange: (-4000.0, 4000.0),
            yrange: (-3000.0, 3000.0),
            step: 25.0,
        }
    }
}

impl RetinaPatch {
    fn axis(range: (f64, f64), step: f64) -> Vec<f64> {
        let n = ((range.1 - range.0) / step).round() as usize + 1;
        linspace(range.0, range.1, n)
    }

    /// Grid in µm; the visual-field matrices hold the plain magnification inverse.
    pub fn grid(&self) -> Result<RetinalGrid> {
        let dva = GridCfg {
            xrange: (ret2dva(self.xrange.0), ret2dva(self.xrange.1)),
            yrange: (ret2dva(self.yrange.0), ret2dva(self.yrange.1)),
            step: ret2dva(self.step),
        };
        dva.validate()?;
        let xs = Self::axis(self.xrange, self.step);
        let ys = Self::axis(self.yrange, self.step);
        let xret = ShapeImage::from_fn(ys.len(), xs.len(), |_, c| xs[c]);
        let yret = ShapeImage::from_fn(ys.len(), xs.len(), |r, _| ys[r]);
        RetinalGrid::from_retinal_mesh(dva, xret, yret)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationCfg {
    pub implant: ImplantCfg,
    pub retina: RetinaPatch,
    pub spread: SpreadKind,
    /// ρ (scoreboard) or width (gaussian), µm; unused by `ahuja`.
    pub width: f64,
    /// Apply the axonal effective-current conversion (`ahuja` only).
    pub use_ofl: bool,
    /// Warp percepts into visual-field coordinates.
    pub use_persp_trafo: bool,
    /// Visual-field extent (dva) of warped percepts; defaults to the patch.
    pub out_xrange: Option<(f64, f64)>,
    pub out_yrange: Option<(f64, f64)>,
    pub parallel: ParallelCfg,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            implant: ImplantCfg::default(),
            retina: RetinaPatch::default(),
            spread: SpreadKind::Gaussian,
            width: 100.0,
            use_ofl: false,
            use_persp_trafo: false,
            out_xrange: None,
            out_yrange: None,
            parallel: ParallelCfg::default(),
        }
    }
}

/// Simulated percept of one stimulus.
#[derive(Clone, Debug, PartialEq)]
pub struct Percept {
    pub image: ShapeImage,
    pub degeneracies: Vec<Degeneracy>,
}

#[derive(Debug)]
pub struct Simulation {
    cfg: SimulationCfg,
    array: ElectrodeArray,
    grid: RetinalGrid,
    spread: Arc<dyn CurrentSpread>,
    exec: Executor,
    cache: CurrentMapCache,
    inverse: InverseDisplacement,
}

impl Simulation {
    pub fn new(cfg: SimulationCfg) -> Result<Self> {
        if cfg.use_persp_trafo && cfg.implant.eye == Eye::Left {
            return Err(PhospheneError::UnsupportedConfiguration {
                reason: "perspective transform is only defined for the right eye".into(),
            });
        }
        let array = cfg.implant.instantiate()?;
        let grid = cfg.retina.grid()?;
        let spread = cfg.spread.build(cfg.width, cfg.use_ofl)?;
        let exec = cfg.parallel.executor()?;
        tracing::debug!(spread = ?cfg.spread, shape = ?grid.shape(), "simulation ready");
        Ok(Self {
            cfg,
            array,
            grid,
            spread,
            exec,
            cache: CurrentMapCache::new(),
            inverse: InverseDisplacement::new(),
        })
    }

    #[inline]
    pub fn cfg(&self) -> &SimulationCfg {
        &self.cfg
    }

    #[inline]
    pub fn grid(&self) -> &RetinalGrid {
        &self.grid
    }

    #[inline]
    pub fn cache(&self) -> &CurrentMapCache {
        &self.cache
    }

    /// Swap the spread model; cached maps are dropped.
    pub fn set_spread(&mut self, kind: SpreadKind, width: f64, use_ofl: bool) -> Result<()> {
        self.spread = kind.build(width, use_ofl)?;
        self.cfg.spread = kind;
        self.cfg.width = width;
        self.cfg.use_ofl = use_ofl;
        self.cache.clear();
        Ok(())
    }

    /// Compute the maps of every electrode named in `stimuli` that is not
    /// cached yet. Returns how many were computed.
    pub fn calc_currents<S: AsRef<str>>(&mut self, stimuli: &[S]) -> Result<usize> {
        let mut names: Vec<ElectrodeName> = Vec::new();
        for s in stimuli {
            names.extend(parse_stimulus(s.as_ref())?);
        }
        self.cache
            .ensure(&names, &self.array, &self.grid, self.spread.as_ref(), &self.exec)
    }

    /// Percept of `stimulus` at amplitude `amp`.
    pub fn percept(&mut self, stimulus: &str, amp: f64) -> Result<Percept> {
        let names = parse_stimulus(stimulus)?;
        self.cache
            .ensure(&names, &self.array, &self.grid, self.spread.as_ref(), &self.exec)?;
        let out = stimulus_field(stimulus, &names, amp, &self.cache)?;
        let image = if self.cfg.use_persp_trafo {
            self.perspective_warp(&out.field)
        } else {
            out.field
        };
        Ok(Percept {
            image,
            degeneracies: out.degeneracies,
        })
    }

    fn out_ranges(&self) -> ((f64, f64), (f64, f64)) {
        let patch = self.cfg.retina;
        let to_dva = |r: (f64, f64)| (ret2dva(r.0), ret2dva(r.1));
        (
            self.cfg.out_xrange.unwrap_or_else(|| to_dva(patch.xrange)),
            self.cfg.out_yrange.unwrap_or_else(|| to_dva(patch.yrange)),
        )
    }

    /// Resample a retinal field into visual-field coordinates; same shape.
    pub fn perspective_warp(&self, field: &ShapeImage) -> ShapeImage {
        let (rows, cols) = field.shape();
        let (ox, oy) = self.out_ranges();
        let (ix, iy) = (self.cfg.retina.xrange, self.cfg.retina.yrange);
        ShapeImage::from_fn(rows, cols, |r, c| {
            let x = ox.0 + c as f64 / cols as f64 * (ox.1 - ox.0);
            let y = oy.0 + r as f64 / rows as f64 * (oy.1 - oy.0);
            let rho = x.hypot(y);
            let Some(rho0) = self.inverse.radius(rho, Meridian::of_x(x)) else {
                return 0.0;
            };
            let theta = y.atan2(x);
            let xr = dva2ret(rho0) * theta.cos();
            let yr = dva2ret(rho0) * theta.sin();
            let col = (xr - ix.0) / (ix.1 - ix.0) * cols as f64;
            let row = (yr - iy.0) / (iy.1 - iy.0) * rows as f64;
            bilinear(field, row, col)
        })
    }
}
