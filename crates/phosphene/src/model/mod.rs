//! Fit / predict / score orchestration.
//!
//! Purpose
//! - A model that, once fitted to the electrodes of a data set, predicts the
//!   binarized phosphene drawing of every row and scores predictions against
//!   target drawings with a pluggable loss.
//!
//! Why this design
//! - Grid construction and scoring are strategies composed by value:
//!   `SpatialModel<G: RetinalGridStrategy, L: LossStrategy>`. `ModelA` maps
//!   the visual field linearly, `ModelB` applies the displacement transform.
//! - State is explicit: `fitted` holds the implant and grid; `None` means
//!   unfitted. Parameter updates that affect maps clear the cache and, on a
//!   fitted model, rebuild implant and grid right away.
//! - The cache is written only between parallel batches (`CurrentMapCache::ensure`);
//!   per-row prediction reads it immutably.
//!
//! Code cross-refs: `crate::spread`, `crate::srd`, `crate::geom`.

mod cfg;

pub use cfg::{ModelCfg, ParamUpdate};

use crate::error::{Degeneracy, PhospheneError, Result};
use crate::geom::{ProjectDirect, ProjectThenDisplace, RetinalGrid, RetinalGridStrategy};
use crate::imgproc::{thresholded_image, ShapeImage, Threshold};
use crate::implant::{parse_stimulus, ElectrodeArray, ElectrodeName};
use crate::parallel::Executor;
use crate::spread::{stimulus_field, CurrentMapCache, Scoreboard};
use crate::srd::{loss_batch, LossStrategy, SrdLoss};

/// One input row: which electrode(s) were stimulated and how the drawing was
/// recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRow {
    pub id: String,
    /// Single electrode (`"A1"`) or several joined by `_` (`"A1_B2"`).
    pub electrode: String,
    pub amp: Option<f64>,
    /// `(rows, cols)` of the recorded drawing, if known.
    pub img_shape: Option<(usize, usize)>,
}

impl FeatureRow {
    pub fn new(id: impl Into<String>, electrode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            electrode: electrode.into(),
            amp: None,
            img_shape: None,
        }
    }
}

/// Ground-truth drawing for the row with the same `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetRow {
    pub id: String,
    pub image: ShapeImage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub image: ShapeImage,
    pub degeneracies: Vec<Degeneracy>,
}

#[derive(Debug)]
struct Fitted {
    array: ElectrodeArray,
    grid: RetinalGrid,
}

/// Scoreboard model with injected grid and loss strategies.
#[derive(Debug)]
pub struct SpatialModel<G, L> {
    cfg: ModelCfg,
    grid_strategy: G,
    loss: L,
    exec: Executor,
    cache: CurrentMapCache,
    fitted: Option<Fitted>,
}

/// Linear magnification, SRD loss.
pub type ModelA = SpatialModel<ProjectDirect, SrdLoss>;
/// Displacement transform, SRD loss.
pub type ModelB = SpatialModel<ProjectThenDisplace, SrdLoss>;

impl<G: RetinalGridStrategy + Default> SpatialModel<G, SrdLoss> {
    /// SRD-scored model using `cfg.weights`.
    pub fn new(cfg: ModelCfg) -> Result<Self> {
        let loss = SrdLoss::new(cfg.weights)?;
        Self::with_strategies(cfg, G::default(), loss)
    }
}

impl<G: RetinalGridStrategy, L: LossStrategy> SpatialModel<G, L> {
    pub fn with_strategies(cfg: ModelCfg, grid_strategy: G, loss: L) -> Result<Self> {
        cfg.validate()?;
        let exec = cfg.parallel.executor()?;
        Ok(Self {
            cfg,
            grid_strategy,
            loss,
            exec,
            cache: CurrentMapCache::new(),
            fitted: None,
        })
    }

    #[inline]
    pub fn cfg(&self) -> &ModelCfg {
        &self.cfg
    }

    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    #[inline]
    pub fn cache(&self) -> &CurrentMapCache {
        &self.cache
    }

    pub fn grid(&self) -> Option<&RetinalGrid> {
        self.fitted.as_ref().map(|f| &f.grid)
    }

    pub fn implant(&self) -> Option<&ElectrodeArray> {
        self.fitted.as_ref().map(|f| &f.array)
    }

    /// Back to the unfitted state with an empty cache.
    pub fn reset(&mut self) {
        self.fitted = None;
        self.cache.clear();
    }

    /// Apply a parameter update. Updates that touch maps clear the cache;
    /// a fitted model rebuilds its implant and grid immediately. On error the
    /// previous configuration is kept.
    pub fn set_param(&mut self, update: ParamUpdate) -> Result<()> {
        let mut next = self.cfg;
        let stale = next.apply(update);
        next.validate()?;
        let exec = next.parallel.executor()?;
        if stale {
            if self.fitted.is_some() {
                self.fitted = Some(self.build(&next)?);
            }
            self.cache.clear();
            tracing::debug!(?update, "parameter change invalidated current maps");
        }
        self.cfg = next;
        self.exec = exec;
        Ok(())
    }

    /// `set_param` from a string key and value.
    pub fn set_param_str(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_param(ParamUpdate::parse(key, value)?)
    }

    fn build(&self, cfg: &ModelCfg) -> Result<Fitted> {
        let array = cfg.implant.instantiate()?;
        let grid = self.grid_strategy.build(&cfg.grid, cfg.implant.eye)?;
        Ok(Fitted { array, grid })
    }

    fn row_electrodes(features: &[FeatureRow]) -> Result<Vec<Vec<ElectrodeName>>> {
        features
            .iter()
            .map(|row| parse_stimulus(&row.electrode))
            .collect()
    }

    fn ensure_maps(&mut self, electrodes: &[Vec<ElectrodeName>]) -> Result<usize> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(PhospheneError::NotFitted { method: "ensure_maps" })?;
        let spread = Scoreboard::new(self.cfg.rho)?;
        self.cache.ensure(
            electrodes.iter().flatten(),
            &fitted.array,
            &fitted.grid,
            &spread,
            &self.exec,
        )
    }

    /// Instantiate the implant, build the grid and compute the map of every
    /// electrode named in `features`.
    pub fn fit(&mut self, features: &[FeatureRow]) -> Result<&mut Self> {
        let electrodes = Self::row_electrodes(features)?;
        let fitted = self.build(&self.cfg)?;
        if self
            .fitted
            .as_ref()
            .map_or(true, |f| f.grid != fitted.grid || f.array != fitted.array)
        {
            self.cache.clear();
        }
        self.fitted = Some(fitted);
        let computed = match self.ensure_maps(&electrodes) {
            Ok(n) => n,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        tracing::debug!(rows = features.len(), computed, "model fitted");
        Ok(self)
    }

    /// Binarized drawing per row, in row order.
    ///
    /// Electrodes first seen here get their maps computed lazily. A single
    /// electrode without amplitude uses its map as is; otherwise the summed
    /// field is scaled to the row amplitude (default 1).
    pub fn predict(&mut self, features: &[FeatureRow]) -> Result<Vec<Prediction>> {
        if self.fitted.is_none() {
            return Err(PhospheneError::NotFitted { method: "predict" });
        }
        let electrodes = Self::row_electrodes(features)?;
        self.ensure_maps(&electrodes)?;

        let rows: Vec<(&FeatureRow, &Vec<ElectrodeName>)> =
            features.iter().zip(&electrodes).collect();
        let cache = &self.cache;
        let thresh = Threshold::Fixed(self.cfg.img_thresh);
        self.exec.map(&rows, |(row, names)| {
            let (field, degeneracies) = match (names.as_slice(), row.amp) {
                ([single], None) => {
                    let map = cache.get(single).ok_or_else(|| {
                        PhospheneError::shape(format!("no current map cached for electrode {single}"))
                    })?;
                    (map.clone(), Vec::new())
                }
                (_, amp) => {
                    let out = stimulus_field(&row.electrode, names, amp.unwrap_or(1.0), cache)?;
                    (out.field, out.degeneracies)
                }
            };
            Ok(Prediction {
                id: row.id.clone(),
                image: thresholded_image(&field, thresh, row.img_shape),
                degeneracies,
            })
        })
    }

    /// Mean loss of the predictions against `targets`; row ids must match in
    /// order.
    pub fn score(&mut self, features: &[FeatureRow], targets: &[TargetRow]) -> Result<f64> {
        if self.fitted.is_none() {
            return Err(PhospheneError::NotFitted { method: "score" });
        }
        if features.len() != targets.len() {
            return Err(PhospheneError::shape(format!(
                "{} feature rows but {} target rows",
                features.len(),
                targets.len()
            )));
        }
        if features.is_empty() {
            return Err(PhospheneError::shape("cannot score an empty data set"));
        }
        let predictions = self.predict(features)?;
        let mut pairs = Vec::with_capacity(targets.len());
        for (t, p) in targets.iter().zip(&predictions) {
            if t.id != p.id {
                return Err(PhospheneError::shape(format!(
                    "row ids disagree: target '{}' vs prediction '{}'",
                    t.id, p.id
                )));
            }
            pairs.push((&t.image, &p.image));
        }
        let losses = loss_batch(&self.loss, &pairs, &self.exec)?;
        Ok(losses.iter().sum::<f64>() / losses.len() as f64)
    }
}

#[cfg(test)]
mod tests;
