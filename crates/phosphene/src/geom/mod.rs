//! Visual-field ↔ retina geometry.
//!
//! Purpose
//! - Map visual-field coordinates (dva) onto the retinal surface (µm) with the
//!   meridian-dependent ganglion-cell displacement, and build the sampling
//!   grids every current map lives on.
//!
//! Why this design
//! - The forward map is closed form and batched over slices of points; grids
//!   go through it in one call instead of point by point.
//! - The inverse is a sampled table (`InverseDisplacement`) that refuses to
//!   extrapolate, so out-of-range inverse positions surface as `None`.
//! - Grid construction is a strategy (`RetinalGridStrategy`) composed into the
//!   model by value.
//!
//! Code cross-refs: `crate::spread` (maps over `RetinalGrid`),
//! `crate::simulation` (perspective warp through the inverse).

mod displace;
mod grid;
mod types;

pub use displace::{
    calc_displacement, dva2ret, ret2dva, to_retinal, DisplacementCurve, InverseDisplacement,
    Meridian, INVERSE_MAX_DVA, INVERSE_STEP_DVA, RET_PER_DVA,
};
pub use grid::{
    GridCfg, ProjectDirect, ProjectThenDisplace, RetinalGrid, RetinalGridStrategy,
};
pub(crate) use grid::linspace;
pub use types::{Eye, RetinalPoint, VisualFieldPoint};

#[cfg(test)]
mod tests;
