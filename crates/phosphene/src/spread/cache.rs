//! Per-electrode current-map cache.
//!
//! Invariants
//! - Keys are canonical `ElectrodeName`s; each key is written at most once
//!   until `clear`.
//! - Writes happen only in `insert_batch`, after a (possibly parallel) batch
//!   has finished; workers never touch the cache.

use std::collections::{BTreeSet, HashMap};

use super::{CurrentMap, CurrentSpread};
use crate::error::{PhospheneError, Result};
use crate::geom::RetinalGrid;
use crate::implant::{ElectrodeArray, ElectrodeName};
use crate::parallel::Executor;

#[derive(Clone, Debug, Default)]
pub struct CurrentMapCache {
    maps: HashMap<ElectrodeName, CurrentMap>,
}

impl CurrentMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &ElectrodeName) -> bool {
        self.maps.contains_key(name)
    }

    #[inline]
    pub fn get(&self, name: &ElectrodeName) -> Option<&CurrentMap> {
        self.maps.get(name)
    }

    /// Drop every map (grid or spread parameters changed).
    pub fn clear(&mut self) {
        self.maps.clear();
    }

    /// Distinct names without a cached map, in sorted order.
    pub fn missing<'a, I>(&self, names: I) -> Vec<ElectrodeName>
    where
        I: IntoIterator<Item = &'a ElectrodeName>,
    {
        names
            .into_iter()
            .filter(|n| !self.maps.contains_key(*n))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Merge a finished batch. Fails without inserting anything if any name is
    /// already cached or appears twice in the batch.
    pub fn insert_batch(&mut self, batch: Vec<(ElectrodeName, CurrentMap)>) -> Result<()> {
        {
            let mut seen = BTreeSet::new();
            for (name, _) in &batch {
                if self.maps.contains_key(name) || !seen.insert(name) {
                    return Err(PhospheneError::DuplicateCacheEntry {
                        name: name.to_string(),
                    });
                }
            }
        }
        self.maps.extend(batch);
        Ok(())
    }

    /// Compute maps for the uncached `names` on `exec` and merge them.
    /// Returns how many maps were computed.
    pub fn ensure<'a, I>(
        &mut self,
        names: I,
        array: &ElectrodeArray,
        grid: &RetinalGrid,
        spread: &dyn CurrentSpread,
        exec: &Executor,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ElectrodeName>,
    {
        let todo = self.missing(names);
        if todo.is_empty() {
            return Ok(0);
        }
        let batch = exec.map(&todo, |name| {
            let electrode = array.get(name)?;
            let map = spread.map_for(electrode, grid)?;
            if map.shape() != grid.shape() {
                return Err(PhospheneError::shape(format!(
                    "current map for {name} has shape {:?}, grid is {:?}",
                    map.shape(),
                    grid.shape()
                )));
            }
            Ok((name.clone(), map))
        })?;
        let computed = batch.len();
        self.insert_batch(batch)?;
        tracing::debug!(computed, cached = self.len(), "current maps merged");
        Ok(computed)
    }
}
