//! Curated internal API (UNSTABLE).
//!
//! - Not a public API; a convenience surface for the CLI, benches and demos.
//!   Breaking changes are allowed.
//! - Prefer these re-exports over deep module paths.

// Geometry
pub use crate::geom::{
    calc_displacement, dva2ret, ret2dva, to_retinal, Eye, GridCfg, InverseDisplacement, Meridian,
    ProjectDirect, ProjectThenDisplace, RetinalGrid, RetinalGridStrategy, RetinalPoint,
    VisualFieldPoint,
};
// Implants
pub use crate::implant::{
    parse_stimulus, Electrode, ElectrodeArray, ElectrodeName, ImplantCfg, ImplantKind,
};
// Current spread
pub use crate::spread::{
    stimulus_field, AhujaSpread, Anatomical, AxonalPhysiology, CurrentMap, CurrentMapCache,
    CurrentSpread, Gaussian, Scoreboard, SpreadKind, StimulusField,
};
// Images and shape matching
pub use crate::aggregate::{
    aggregate, aggregate_registered, mean_images, trial_centers, Aggregate, GroupKey,
    MeanImageCfg, MeanImages, Trial,
};
pub use crate::imgproc::{
    binarize, binarize_otsu, center_phosphene, dice_coefficient, region_props,
    thresholded_image, RegionProps, ShapeImage, Threshold,
};
pub use crate::srd::{
    align, loss_batch, srd_loss, AlignmentParams, LossStrategy, Registration, SrdLoss, SrdWeights,
};
// Orchestration
pub use crate::model::{
    FeatureRow, ModelA, ModelB, ModelCfg, ParamUpdate, Prediction, SpatialModel, TargetRow,
};
pub use crate::parallel::{Engine, Executor, ParallelCfg};
pub use crate::simulation::{Percept, RetinaPatch, Simulation, SimulationCfg};
