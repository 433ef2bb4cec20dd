//! Point types for the two reference frames and the eye selector.

use std::fmt;
use std::str::FromStr;

use crate::error::PhospheneError;

/// Point in the visual field, degrees of visual angle (dva).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisualFieldPoint {
    pub x: f64,
    pub y: f64,
}

impl VisualFieldPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Polar form `(theta, rho)`.
    #[inline]
    pub fn polar(&self) -> (f64, f64) {
        (self.y.atan2(self.x), self.x.hypot(self.y))
    }
}

/// Point on the retinal surface, micrometers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetinalPoint {
    pub x: f64,
    pub y: f64,
}

impl RetinalPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dist2(&self, other: &RetinalPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Which eye the implant sits in. Only the right eye has a displacement model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Eye {
    #[default]
    Right,
    Left,
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eye::Right => write!(f, "RE"),
            Eye::Left => write!(f, "LE"),
        }
    }
}

impl FromStr for Eye {
    type Err = PhospheneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RE" => Ok(Eye::Right),
            "LE" => Ok(Eye::Left),
            other => Err(PhospheneError::config(format!(
                "eye must be 'RE' or 'LE', not '{other}'"
            ))),
        }
    }
}
