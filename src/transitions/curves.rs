//! Timing curves: monotonic maps from linear progress in `[0, 1]` to eased progress in `[0, 1]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParameterError, Result};

/// Steepness of the logistic curve
const SIGMOID_STEEPNESS: f64 = 10.0;

/// Named easing curve used by every blending transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpeedCurve {
    #[default]
    Linear,
    Quadratic,
    Cubic,
    Sigmoid,
}

impl SpeedCurve {
    pub const ALL: [SpeedCurve; 4] = [
        SpeedCurve::Linear,
        SpeedCurve::Quadratic,
        SpeedCurve::Cubic,
        SpeedCurve::Sigmoid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpeedCurve::Linear => "linear",
            SpeedCurve::Quadratic => "quadratic",
            SpeedCurve::Cubic => "cubic",
            SpeedCurve::Sigmoid => "sigmoid",
        }
    }

    /// Eased progress for linear progress `t`. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        self.function()(t)
    }

    pub fn function(self) -> fn(f64) -> f64 {
        match self {
            SpeedCurve::Linear => linear,
            SpeedCurve::Quadratic => quadratic,
            SpeedCurve::Cubic => cubic,
            SpeedCurve::Sigmoid => sigmoid,
        }
    }
}

/// Look up a curve by name
pub fn curve(name: &str) -> Result<fn(f64) -> f64> {
    Ok(name.parse::<SpeedCurve>()?.function())
}

fn clamp_unit(t: f64) -> f64 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

fn linear(t: f64) -> f64 {
    clamp_unit(t)
}

fn quadratic(t: f64) -> f64 {
    let t = clamp_unit(t);
    t * t
}

fn cubic(t: f64) -> f64 {
    let t = clamp_unit(t);
    t * t * t
}

/// Logistic curve rescaled so that `sigmoid(0) == 0` and `sigmoid(1) == 1` exactly
fn sigmoid(t: f64) -> f64 {
    let logistic = |x: f64| 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (x - 0.5)).exp());
    let low = logistic(0.0);
    let high = logistic(1.0);
    ((logistic(clamp_unit(t)) - low) / (high - low)).clamp(0.0, 1.0)
}

impl FromStr for SpeedCurve {
    type Err = ParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SpeedCurve::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParameterError::UnknownCurve {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for SpeedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for SpeedCurve {
    type Error = ParameterError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpeedCurve> for String {
    fn from(curve: SpeedCurve) -> Self {
        curve.name().to_string()
    }
}
