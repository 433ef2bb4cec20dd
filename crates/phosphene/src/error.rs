//! Error taxonomy and non-fatal degeneracy markers.
//!
//! Hard errors (`PhospheneError`) always propagate to the caller. Numeric edge
//! cases (zero amplitude, empty drawings) are not errors: they are recovered
//! locally into finite results and reported as a `Degeneracy`, which callers
//! can inspect and which is also logged through `tracing`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = PhospheneError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhospheneError {
    /// A configuration the model does not define (e.g. the left eye).
    #[error("unsupported configuration: {reason}")]
    UnsupportedConfiguration { reason: String },

    /// Invalid constructor or parameter value.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// Prediction or scoring requested before `fit`.
    #[error("this model is not fitted yet; call `fit` before `{method}`")]
    NotFitted { method: &'static str },

    /// Electrode absent from the instantiated implant.
    #[error("electrode '{name}' could not be found")]
    ElectrodeNotFound { name: String },

    /// Electrode identifier that is not a letter followed by a positive integer.
    #[error("malformed electrode name '{name}'")]
    InvalidElectrodeName { name: String },

    /// Missing identifiers, misaligned rows, or mismatched array shapes.
    #[error("data shape mismatch: {reason}")]
    DataShape { reason: String },

    /// A second current map was produced for an already cached electrode.
    #[error("current map for electrode '{name}' is already cached")]
    DuplicateCacheEntry { name: String },
}

impl PhospheneError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        Self::DataShape {
            reason: reason.into(),
        }
    }
}

/// Non-fatal degenerate input. The computation that met it still returned a
/// defined, finite result.
#[derive(Clone, Debug, PartialEq)]
pub enum Degeneracy {
    /// Stimulation amplitude was (numerically) zero.
    ZeroAmplitude { stimulus: String },
    /// Summed field had no positive value; amplitude scaling was skipped.
    ZeroPeak { stimulus: String },
    /// An image without foreground entered registration or aggregation.
    EmptyImage { context: &'static str },
}

impl Degeneracy {
    /// Log the degeneracy at warn level and hand it back.
    pub(crate) fn report(self) -> Self {
        match &self {
            Degeneracy::ZeroAmplitude { stimulus } => {
                tracing::warn!(stimulus = %stimulus, "amplitude is zero");
            }
            Degeneracy::ZeroPeak { stimulus } => {
                tracing::warn!(stimulus = %stimulus, "summed field has zero peak; skipping amplitude scaling");
            }
            Degeneracy::EmptyImage { context } => {
                tracing::warn!(context = *context, "image has zero area");
            }
        }
        self
    }
}
