//! Model configuration and typed parameter updates.

use std::str::FromStr;

use crate::error::{PhospheneError, Result};
use crate::geom::GridCfg;
use crate::implant::{ImplantCfg, ImplantKind};
use crate::parallel::{Engine, ParallelCfg};
use crate::srd::SrdWeights;

/// Everything a `SpatialModel` is parameterized by.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelCfg {
    pub implant: ImplantCfg,
    pub grid: GridCfg,
    /// Predicted images are `current > img_thresh`.
    pub img_thresh: f64,
    pub weights: SrdWeights,
    /// Scoreboard radius (µm).
    pub rho: f64,
    pub parallel: ParallelCfg,
}

impl Default for ModelCfg {
    fn default() -> Self {
        Self {
            implant: ImplantCfg::default(),
            grid: GridCfg::default(),
            img_thresh: 0.1,
            weights: SrdWeights::default(),
            rho: 100.0,
            parallel: ParallelCfg::default(),
        }
    }
}

impl ModelCfg {
    pub fn validate(&self) -> Result<()> {
        self.implant.validate()?;
        self.grid.validate()?;
        self.weights.validate()?;
        if !self.img_thresh.is_finite() {
            return Err(PhospheneError::config(format!(
                "img_thresh must be finite, got {}",
                self.img_thresh
            )));
        }
        if !(self.rho.is_finite() && self.rho > 0.0) {
            return Err(PhospheneError::config(format!(
                "rho must be positive, got {}",
                self.rho
            )));
        }
        Ok(())
    }

    /// Apply one update. Returns whether cached maps (and the fitted grid and
    /// implant) are stale afterwards.
    pub fn apply(&mut self, update: ParamUpdate) -> bool {
        match update {
            ParamUpdate::ImplantKind(k) => self.implant.kind = k,
            ParamUpdate::ImplantX(v) => self.implant.x = v,
            ParamUpdate::ImplantY(v) => self.implant.y = v,
            ParamUpdate::ImplantRot(v) => self.implant.rot = v,
            ParamUpdate::XRange(r) => self.grid.xrange = r,
            ParamUpdate::YRange(r) => self.grid.yrange = r,
            ParamUpdate::XyStep(v) => self.grid.step = v,
            ParamUpdate::Rho(v) => self.rho = v,
            ParamUpdate::ImgThresh(v) => {
                self.img_thresh = v;
                return false;
            }
            ParamUpdate::WScale(v) => {
                self.weights.w_scale = v;
                return false;
            }
            ParamUpdate::WRot(v) => {
                self.weights.w_rot = v;
                return false;
            }
            ParamUpdate::WDice(v) => {
                self.weights.w_dice = v;
                return false;
            }
            ParamUpdate::NJobs(n) => {
                self.parallel.engine = match n {
                    Some(1) => Engine::Serial,
                    n => Engine::Threads { n_jobs: n },
                };
                return false;
            }
        }
        true
    }
}

/// One named parameter change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamUpdate {
    ImplantKind(ImplantKind),
    ImplantX(f64),
    ImplantY(f64),
    ImplantRot(f64),
    XRange((f64, f64)),
    YRange((f64, f64)),
    XyStep(f64),
    Rho(f64),
    ImgThresh(f64),
    WScale(f64),
    WRot(f64),
    WDice(f64),
    /// `None` = all cores, `Some(1)` = serial.
    NJobs(Option<usize>),
}

fn number(key: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        PhospheneError::config(format!("parameter '{key}' expects a number, got '{value}'"))
    })
}

fn pair(key: &str, value: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = value.split(',').collect();
    match parts[..] {
        [lo, hi] => Ok((number(key, lo)?, number(key, hi)?)),
        _ => Err(PhospheneError::config(format!(
            "parameter '{key}' expects 'min,max', got '{value}'"
        ))),
    }
}

impl ParamUpdate {
    /// Parse a `key=value` style update (`"rho"`, `"150"`; `"xrange"`, `"-10,10"`).
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        Ok(match key {
            "implant_type" => ParamUpdate::ImplantKind(ImplantKind::from_str(value.trim())?),
            "implant_x" => ParamUpdate::ImplantX(number(key, value)?),
            "implant_y" => ParamUpdate::ImplantY(number(key, value)?),
            "implant_rot" => ParamUpdate::ImplantRot(number(key, value)?),
            "xrange" => ParamUpdate::XRange(pair(key, value)?),
            "yrange" => ParamUpdate::YRange(pair(key, value)?),
            "xystep" => ParamUpdate::XyStep(number(key, value)?),
            "rho" => ParamUpdate::Rho(number(key, value)?),
            "img_thresh" => ParamUpdate::ImgThresh(number(key, value)?),
            "w_scale" => ParamUpdate::WScale(number(key, value)?),
            "w_rot" => ParamUpdate::WRot(number(key, value)?),
            "w_dice" => ParamUpdate::WDice(number(key, value)?),
            "n_jobs" => ParamUpdate::NJobs(match value.trim() {
                "all" | "-1" => None,
                v => Some(v.parse::<usize>().map_err(|_| {
                    PhospheneError::config(format!("n_jobs expects a count or 'all', got '{v}'"))
                })?),
            }),
            other => {
                return Err(PhospheneError::config(format!(
                    "unknown model parameter '{other}'"
                )))
            }
        })
    }

    /// Parse `"key=value"`.
    pub fn parse_assignment(assignment: &str) -> Result<Self> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            PhospheneError::config(format!("expected key=value, got '{assignment}'"))
        })?;
        Self::parse(key.trim(), value)
    }
}
