//! Phosphene simulation and shape matching for retinal implants.
//!
//! Layers, leaves first:
//! - `geom`: visual field ↔ retina transform, sampling grids.
//! - `implant`: electrode names and array layouts.
//! - `spread`: per-electrode current maps, cache, multi-electrode fields.
//! - `imgproc`: region properties, thresholds, warps, Dice.
//! - `srd`: scale/rotation/Dice registration and loss.
//! - `aggregate`: mean images from trial drawings.
//! - `model`: fit / predict / score.
//! - `simulation`: stimulus-level percepts with optional perspective warp.
//!
//! API Policy
//! - The crate is project-internal; there is no stable public API. `api`
//!   collects the re-exports callers normally need.

pub mod aggregate;
pub mod api;
pub mod error;
pub mod geom;
pub mod imgproc;
pub mod implant;
pub mod model;
pub mod parallel;
pub mod simulation;
pub mod spread;
pub mod srd;
pub mod synth;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{Degeneracy, PhospheneError, Result};
pub use imgproc::ShapeImage;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::aggregate::{aggregate, aggregate_registered, Aggregate};
    pub use crate::error::{Degeneracy, PhospheneError, Result};
    pub use crate::geom::{Eye, GridCfg, RetinalPoint, VisualFieldPoint};
    pub use crate::imgproc::{region_props, RegionProps, ShapeImage};
    pub use crate::implant::{ElectrodeName, ImplantCfg, ImplantKind};
    pub use crate::model::{FeatureRow, ModelA, ModelB, ModelCfg, ParamUpdate, TargetRow};
    pub use crate::parallel::ParallelCfg;
    pub use crate::simulation::{Simulation, SimulationCfg};
    pub use crate::srd::{align, srd_loss, AlignmentParams, SrdWeights};
}
