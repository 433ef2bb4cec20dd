//! Retinal sampling grids and the two grid-construction strategies.
//!
//! - `GridCfg`: visual-field patch `(xrange, yrange)` in dva and step size.
//! - `RetinalGrid`: the `xy`-indexed mesh (rows follow y, columns follow x) in
//!   both frames. Immutable once built; rebuild when the configuration changes.
//! - `RetinalGridStrategy`: `ProjectThenDisplace` runs the displacement
//!   transform over the whole mesh in one batch; `ProjectDirect` only applies
//!   the linear retinal magnification.

use nalgebra::DMatrix;

use super::displace::{dva2ret, to_retinal};
use super::types::{Eye, VisualFieldPoint};
use crate::error::{PhospheneError, Result};

/// Visual-field patch simulated by a model (dva).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridCfg {
    pub xrange: (f64, f64),
    pub yrange: (f64, f64),
    pub step: f64,
}

impl Default for GridCfg {
    fn default() -> Self {
        Self {
            xrange: (-30.0, 30.0),
            yrange: (-20.0, 20.0),
            step: 0.1,
        }
    }
}

impl GridCfg {
    pub fn validate(&self) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(PhospheneError::config(format!(
                "grid step must be positive, got {}",
                self.step
            )));
        }
        for (axis, (lo, hi)) in [("xrange", self.xrange), ("yrange", self.yrange)] {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(PhospheneError::config(format!(
                    "{axis} must be a finite (min, max) pair, got ({lo}, {hi})"
                )));
            }
        }
        Ok(())
    }

    /// Grid shape `(ny, nx)`: each axis spans the closed range rounded up to whole steps.
    pub fn shape(&self) -> (usize, usize) {
        (axis_len(self.yrange, self.step), axis_len(self.xrange, self.step))
    }

    /// Visual-field mesh `(x, y)` in dva, each of shape `(ny, nx)`.
    pub fn visual_mesh(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let (ny, nx) = self.shape();
        let xs = linspace(self.xrange.0, self.xrange.1, nx);
        let ys = linspace(self.yrange.0, self.yrange.1, ny);
        let xdva = DMatrix::from_fn(ny, nx, |_, c| xs[c]);
        let ydva = DMatrix::from_fn(ny, nx, |r, _| ys[r]);
        (xdva, ydva)
    }
}

fn axis_len(range: (f64, f64), step: f64) -> usize {
    (((range.1 - range.0 + 1.0) / step).ceil() as usize).max(1)
}

pub(crate) fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let d = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + d * i as f64).collect()
        }
    }
}

/// Sampling grid in both reference frames.
///
/// Invariants:
/// - All four matrices share the shape `cfg.shape()`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetinalGrid {
    cfg: GridCfg,
    pub xdva: DMatrix<f64>,
    pub ydva: DMatrix<f64>,
    pub xret: DMatrix<f64>,
    pub yret: DMatrix<f64>,
}

impl RetinalGrid {
    #[inline]
    pub fn cfg(&self) -> &GridCfg {
        &self.cfg
    }

    /// `(rows, cols)` of every map produced over this grid.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.xret.shape()
    }

    /// Build a grid whose retinal coordinates are given directly (µm), e.g. an
    /// optic-fiber-layer patch. The visual-field matrices hold the plain
    /// magnification inverse.
    pub fn from_retinal_mesh(cfg: GridCfg, xret: DMatrix<f64>, yret: DMatrix<f64>) -> Result<Self> {
        if xret.shape() != yret.shape() {
            return Err(PhospheneError::shape(format!(
                "retinal mesh axes disagree: {:?} vs {:?}",
                xret.shape(),
                yret.shape()
            )));
        }
        let xdva = xret.map(super::displace::ret2dva);
        let ydva = yret.map(super::displace::ret2dva);
        Ok(Self {
            cfg,
            xdva,
            ydva,
            xret,
            yret,
        })
    }
}

/// Grid-construction capability injected into a model.
pub trait RetinalGridStrategy: Send + Sync {
    fn build(&self, cfg: &GridCfg, eye: Eye) -> Result<RetinalGrid>;
}

/// Visual field → retina through the displacement transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectThenDisplace;

impl RetinalGridStrategy for ProjectThenDisplace {
    fn build(&self, cfg: &GridCfg, eye: Eye) -> Result<RetinalGrid> {
        cfg.validate()?;
        let (xdva, ydva) = cfg.visual_mesh();
        let (ny, nx) = xdva.shape();
        // Row-major flattening so `from_row_iterator` restores the mesh.
        let mut points = Vec::with_capacity(ny * nx);
        for r in 0..ny {
            for c in 0..nx {
                points.push(VisualFieldPoint::new(xdva[(r, c)], ydva[(r, c)]));
            }
        }
        let ret = to_retinal(&points, eye)?;
        let xret = DMatrix::from_row_iterator(ny, nx, ret.iter().map(|p| p.x));
        let yret = DMatrix::from_row_iterator(ny, nx, ret.iter().map(|p| p.y));
        tracing::debug!(ny, nx, "built displaced retinal grid");
        Ok(RetinalGrid {
            cfg: *cfg,
            xdva,
            ydva,
            xret,
            yret,
        })
    }
}

/// Visual field → retina by linear magnification only.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectDirect;

impl RetinalGridStrategy for ProjectDirect {
    fn build(&self, cfg: &GridCfg, _eye: Eye) -> Result<RetinalGrid> {
        cfg.validate()?;
        let (xdva, ydva) = cfg.visual_mesh();
        let xret = xdva.map(dva2ret);
        let yret = ydva.map(dva2ret);
        tracing::debug!(shape = ?xret.shape(), "built direct retinal grid");
        Ok(RetinalGrid {
            cfg: *cfg,
            xdva,
            ydva,
            xret,
            yret,
        })
    }
}
