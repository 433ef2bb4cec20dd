//! Explicit parallel-for over independent tasks.
//!
//! Purpose
//! - One abstraction for the three batch call sites (map generation, per-row
//!   prediction, per-pair loss), parameterized by a worker count instead of
//!   an engine/scheduler string.
//!
//! Contract
//! - Tasks borrow their input immutably and return an owned output; they never
//!   see shared mutable state, so the result is identical for every engine.
//! - Output order equals input order.
//! - Fail-fast: an error aborts the batch and is returned instead of a partial
//!   result. Only `Serial` guarantees it is the error of the earliest failing
//!   item; threaded engines may return any failing item's error.

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{PhospheneError, Result};

/// How batch work is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Engine {
    /// Run tasks one after another on the calling thread.
    Serial,
    /// Run tasks on worker threads; `None` uses every available core.
    Threads { n_jobs: Option<usize> },
}

/// Parallel execution settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParallelCfg {
    pub engine: Engine,
}

impl Default for ParallelCfg {
    fn default() -> Self {
        Self {
            engine: Engine::Threads { n_jobs: None },
        }
    }
}

impl ParallelCfg {
    pub fn serial() -> Self {
        Self {
            engine: Engine::Serial,
        }
    }

    pub fn threads(n_jobs: usize) -> Self {
        Self {
            engine: Engine::Threads {
                n_jobs: Some(n_jobs),
            },
        }
    }

    /// Build the executor; a zero worker count is a configuration error.
    pub fn executor(&self) -> Result<Executor> {
        let mode = match self.engine {
            Engine::Serial => Mode::Serial,
            Engine::Threads { n_jobs: None } => Mode::Global,
            Engine::Threads { n_jobs: Some(0) } => {
                return Err(PhospheneError::config("n_jobs must be at least 1"))
            }
            Engine::Threads { n_jobs: Some(n) } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| PhospheneError::config(format!("thread pool: {e}")))?;
                Mode::Pool(Arc::new(pool))
            }
        };
        Ok(Executor { mode })
    }
}

#[derive(Clone, Debug)]
enum Mode {
    Serial,
    Global,
    Pool(Arc<rayon::ThreadPool>),
}

/// Executor built from a `ParallelCfg`. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Executor {
    mode: Mode,
}

impl Default for Executor {
    fn default() -> Self {
        Self { mode: Mode::Global }
    }
}

impl Executor {
    pub fn serial() -> Self {
        Self { mode: Mode::Serial }
    }

    /// Map `f` over `items`, preserving order, stopping at the first error.
    pub fn map<T, U, F>(&self, items: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        match &self.mode {
            Mode::Serial => items.iter().map(f).collect(),
            Mode::Global => items.par_iter().map(f).collect(),
            Mode::Pool(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        }
    }
}
