//! Multi-electrode stimulation: summed single-electrode maps scaled to the amplitude.

use super::{CurrentMap, CurrentMapCache};
use crate::error::{Degeneracy, PhospheneError, Result};
use crate::implant::ElectrodeName;

/// Amplitudes at or below this magnitude count as zero.
const ZERO_AMP_ATOL: f64 = 1e-8;

/// Field of one stimulus plus any degenerate inputs met on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct StimulusField {
    pub field: CurrentMap,
    pub degeneracies: Vec<Degeneracy>,
}

/// Sum the cached maps of `electrodes` and rescale so the peak equals `amp`.
///
/// `label` names the stimulus in warnings (e.g. `"A1_B2"`). A zero peak
/// leaves the sum unscaled.
pub fn stimulus_field(
    label: &str,
    electrodes: &[ElectrodeName],
    amp: f64,
    cache: &CurrentMapCache,
) -> Result<StimulusField> {
    if !(amp.is_finite() && amp >= 0.0) {
        return Err(PhospheneError::config(format!(
            "amplitude must be finite and non-negative, got {amp}"
        )));
    }
    let mut degeneracies = Vec::new();
    if amp.abs() <= ZERO_AMP_ATOL {
        degeneracies.push(
            Degeneracy::ZeroAmplitude {
                stimulus: label.to_string(),
            }
            .report(),
        );
    }
    let mut field: Option<CurrentMap> = None;
    for name in electrodes {
        let map = cache.get(name).ok_or_else(|| {
            PhospheneError::shape(format!("no current map cached for electrode {name}"))
        })?;
        field = Some(match field.take() {
            None => map.clone(),
            Some(mut acc) => {
                if acc.shape() != map.shape() {
                    return Err(PhospheneError::shape(format!(
                        "current maps disagree in shape: {:?} vs {:?}",
                        acc.shape(),
                        map.shape()
                    )));
                }
                acc += map;
                acc
            }
        });
    }
    let mut field =
        field.ok_or_else(|| PhospheneError::shape(format!("stimulus '{label}' names no electrode")))?;
    let peak = field.max();
    if peak > 0.0 {
        field *= amp / peak;
    } else {
        degeneracies.push(
            Degeneracy::ZeroPeak {
                stimulus: label.to_string(),
            }
            .report(),
        );
    }
    Ok(StimulusField {
        field,
        degeneracies,
    })
}
