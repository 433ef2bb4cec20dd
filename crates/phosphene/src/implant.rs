//! Electrode names and implant geometry.
//!
//! - `ElectrodeName`: canonical identifier (letter + positive integer with
//!   leading zeros stripped). `"A01"` and `"A1"` are the same electrode and the
//!   same cache key.
//! - `ImplantCfg`: which array, where it sits (µm) and how it is rotated (rad).
//! - `ElectrodeArray`: the instantiated implant, name → position lookup.
//!
//! Layouts
//! - Argus I: 4 × 4, rows A–D, columns 1–4, 800 µm pitch, radii alternating
//!   130/260 µm in a checkerboard.
//! - Argus II: 6 × 10, rows A–F, columns 1–10, 575 µm pitch, radius 112.5 µm.
//! - Row A lies at the most negative y before rotation; the array rotates
//!   counter-clockwise about its center, then translates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{PhospheneError, Result};
use crate::geom::{Eye, RetinalPoint};

/// Separator between electrodes of a multi-electrode stimulus (`"A1_B2"`).
pub const STIMULUS_SEPARATOR: char = '_';

/// Canonical electrode identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElectrodeName(String);

impl ElectrodeName {
    /// Parse and canonicalize (`"A01"` → `"A1"`).
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || PhospheneError::InvalidElectrodeName {
            name: raw.to_string(),
        };
        let raw_trimmed = raw.trim();
        let mut chars = raw_trimmed.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        if !letter.is_ascii_alphabetic() {
            return Err(invalid());
        }
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number: u32 = digits.parse().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(Self(format!("{letter}{number}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElectrodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ElectrodeName {
    type Err = PhospheneError;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a stimulus string (`"A1_B02"`) into canonical electrode names.
pub fn parse_stimulus(stimulus: &str) -> Result<Vec<ElectrodeName>> {
    stimulus
        .split(STIMULUS_SEPARATOR)
        .map(ElectrodeName::parse)
        .collect()
}

/// One electrode of an instantiated array.
#[derive(Clone, Debug, PartialEq)]
pub struct Electrode {
    pub name: ElectrodeName,
    /// Center on the retinal surface (µm).
    pub center: RetinalPoint,
    /// Disk radius (µm).
    pub radius: f64,
}

/// Electrode array types with a built-in layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImplantKind {
    ArgusI,
    #[default]
    ArgusII,
}

impl FromStr for ImplantKind {
    type Err = PhospheneError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ArgusI" => Ok(ImplantKind::ArgusI),
            "ArgusII" => Ok(ImplantKind::ArgusII),
            other => Err(PhospheneError::config(format!(
                "implant kind must be 'ArgusI' or 'ArgusII', not '{other}'"
            ))),
        }
    }
}

impl ImplantKind {
    /// `(rows, cols, pitch µm)`.
    fn layout(self) -> (usize, usize, f64) {
        match self {
            ImplantKind::ArgusI => (4, 4, 800.0),
            ImplantKind::ArgusII => (6, 10, 575.0),
        }
    }

    fn radius(self, row: usize, col: usize) -> f64 {
        match self {
            ImplantKind::ArgusI => {
                if (row + col) % 2 == 0 {
                    130.0
                } else {
                    260.0
                }
            }
            ImplantKind::ArgusII => 112.5,
        }
    }
}

/// Placement of an implant on the retina.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ImplantCfg {
    pub kind: ImplantKind,
    /// Array center x (µm).
    pub x: f64,
    /// Array center y (µm).
    pub y: f64,
    /// Counter-clockwise rotation (rad).
    pub rot: f64,
    pub eye: Eye,
}

impl Default for ImplantCfg {
    fn default() -> Self {
        Self {
            kind: ImplantKind::ArgusII,
            x: 0.0,
            y: 0.0,
            rot: 0.0,
            eye: Eye::Right,
        }
    }
}

impl ImplantCfg {
    pub fn validate(&self) -> Result<()> {
        for (what, v) in [("x", self.x), ("y", self.y), ("rot", self.rot)] {
            if !v.is_finite() {
                return Err(PhospheneError::config(format!(
                    "implant {what} must be finite, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Lay out every electrode of `kind` at this placement.
    pub fn instantiate(&self) -> Result<ElectrodeArray> {
        self.validate()?;
        let (rows, cols, pitch) = self.kind.layout();
        let (sin, cos) = self.rot.sin_cos();
        let mut electrodes = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let lx = (col as f64 - (cols - 1) as f64 / 2.0) * pitch;
                let ly = (row as f64 - (rows - 1) as f64 / 2.0) * pitch;
                let letter = (b'A' + row as u8) as char;
                electrodes.push(Electrode {
                    name: ElectrodeName(format!("{letter}{}", col + 1)),
                    center: RetinalPoint::new(
                        cos * lx - sin * ly + self.x,
                        sin * lx + cos * ly + self.y,
                    ),
                    radius: self.kind.radius(row, col),
                });
            }
        }
        ElectrodeArray::from_electrodes(self.eye, electrodes)
    }
}

/// Instantiated implant: canonical name → electrode.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectrodeArray {
    eye: Eye,
    electrodes: BTreeMap<ElectrodeName, Electrode>,
}

impl ElectrodeArray {
    /// Build from explicit electrodes; duplicate names are rejected.
    pub fn from_electrodes(eye: Eye, electrodes: Vec<Electrode>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for e in electrodes {
            if !(e.center.x.is_finite() && e.center.y.is_finite() && e.radius >= 0.0) {
                return Err(PhospheneError::config(format!(
                    "electrode {} has an invalid position or radius",
                    e.name
                )));
            }
            if let Some(prev) = map.insert(e.name.clone(), e) {
                return Err(PhospheneError::config(format!(
                    "electrode {} defined twice",
                    prev.name
                )));
            }
        }
        Ok(Self {
            eye,
            electrodes: map,
        })
    }

    #[inline]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.electrodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.electrodes.is_empty()
    }

    pub fn get(&self, name: &ElectrodeName) -> Result<&Electrode> {
        self.electrodes
            .get(name)
            .ok_or_else(|| PhospheneError::ElectrodeNotFound {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Electrode> {
        self.electrodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn names_are_canonicalized() {
        assert_eq!(ElectrodeName::parse("A01").unwrap().as_str(), "A1");
        assert_eq!(ElectrodeName::parse("F10").unwrap().as_str(), "F10");
        assert_eq!(
            ElectrodeName::parse("B007").unwrap(),
            ElectrodeName::parse("B7").unwrap()
        );
        for bad in ["", "A", "1A", "A0", "A-1", "AB1", "A1.5"] {
            assert!(
                matches!(
                    ElectrodeName::parse(bad),
                    Err(PhospheneError::InvalidElectrodeName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn stimulus_splits_on_underscore() {
        let names = parse_stimulus("A01_B2").unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].as_str(), "A1");
        assert_eq!(names[1].as_str(), "B2");
        assert!(parse_stimulus("A1__B2").is_err());
    }

    #[test]
    fn argus_ii_layout_is_centered() {
        let array = ImplantCfg::default().instantiate().unwrap();
        assert_eq!(array.len(), 60);
        let a1 = array.get(&ElectrodeName::parse("A1").unwrap()).unwrap();
        let f10 = array.get(&ElectrodeName::parse("F10").unwrap()).unwrap();
        assert!((a1.center.x + 4.5 * 575.0).abs() < 1e-9);
        assert!((a1.center.y + 2.5 * 575.0).abs() < 1e-9);
        assert!((a1.center.x + f10.center.x).abs() < 1e-9);
        assert!((a1.center.y + f10.center.y).abs() < 1e-9);
        assert!(array
            .get(&ElectrodeName::parse("G1").unwrap())
            .is_err());
    }

    #[test]
    fn rotation_and_translation_are_applied() {
        let cfg = ImplantCfg {
            kind: ImplantKind::ArgusI,
            x: 100.0,
            y: -200.0,
            rot: std::f64::consts::FRAC_PI_2,
            eye: Eye::Right,
        };
        let array = cfg.instantiate().unwrap();
        assert_eq!(array.len(), 16);
        // D4 sits at local (+1200, +1200); a quarter turn maps it to (-1200, +1200).
        let d4 = array.get(&ElectrodeName::parse("D4").unwrap()).unwrap();
        assert!((d4.center.x - (100.0 - 1200.0)).abs() < 1e-9);
        assert!((d4.center.y - (-200.0 + 1200.0)).abs() < 1e-9);
        let a1 = array.get(&ElectrodeName::parse("A1").unwrap()).unwrap();
        let a2 = array.get(&ElectrodeName::parse("A2").unwrap()).unwrap();
        assert_eq!(a1.radius, 130.0);
        assert_eq!(a2.radius, 260.0);
    }

    #[test]
    fn non_finite_placement_is_a_configuration_error() {
        let cfg = ImplantCfg {
            x: f64::NAN,
            ..ImplantCfg::default()
        };
        assert!(matches!(
            cfg.instantiate(),
            Err(PhospheneError::Configuration { .. })
        ));
    }

    proptest! {
        #[test]
        fn leading_zeros_never_change_the_key(letter in "[A-F]", n in 1u32..100, zeros in 0usize..4) {
            let padded = format!("{letter}{}{n}", "0".repeat(zeros));
            let plain = format!("{letter}{n}");
            prop_assert_eq!(
                ElectrodeName::parse(&padded).unwrap(),
                ElectrodeName::parse(&plain).unwrap()
            );
        }
    }
}
