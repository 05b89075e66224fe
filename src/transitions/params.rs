//! Typed parameter sets for each transition kind.
//!
//! Every struct deserializes with `#[serde(default)]`, so a request only has
//! to name the values it overrides. Defaults match the values the merge
//! pipeline has always used.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParameterError, Result};
use crate::transitions::curves::SpeedCurve;
use crate::video::types::Color;

/// Reject non-finite or negative transition durations
pub(crate) fn check_duration(name: &str, duration: f64) -> Result<()> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(ParameterError::OutOfRange {
            name: name.to_string(),
            value: duration.to_string(),
            expected: ">= 0 seconds".to_string(),
        }
        .into());
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ParameterError::OutOfRange {
            name: name.to_string(),
            value: value.to_string(),
            expected: "0.0 to 1.0".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Axis and sense along which a wipe reveals the second clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WipeDirection {
    #[default]
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl WipeDirection {
    pub const ALL: [WipeDirection; 4] = [
        WipeDirection::LeftToRight,
        WipeDirection::RightToLeft,
        WipeDirection::TopToBottom,
        WipeDirection::BottomToTop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WipeDirection::LeftToRight => "left-to-right",
            WipeDirection::RightToLeft => "right-to-left",
            WipeDirection::TopToBottom => "top-to-bottom",
            WipeDirection::BottomToTop => "bottom-to-top",
        }
    }
}

impl FromStr for WipeDirection {
    type Err = ParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        WipeDirection::ALL
            .into_iter()
            .find(|d| d.name() == s.trim())
            .ok_or_else(|| ParameterError::UnknownDirection {
                direction: s.to_string(),
            })
    }
}

/// Radial remap applied by the zoom-warp transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistortionType {
    Bulge,
    Pinch,
}

impl DistortionType {
    pub fn name(self) -> &'static str {
        match self {
            DistortionType::Bulge => "bulge",
            DistortionType::Pinch => "pinch",
        }
    }
}

impl FromStr for DistortionType {
    type Err = ParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "bulge" => Ok(DistortionType::Bulge),
            "pinch" => Ok(DistortionType::Pinch),
            _ => Err(ParameterError::UnknownDistortion {
                name: s.to_string(),
            }),
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ParameterError;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.name().to_string()
            }
        }
    )*};
}

string_conversions!(WipeDirection, DistortionType);

/// A length of time written `HH:MM:SS:mmm`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds.max(0.0))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = ParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParameterError::InvalidTimestamp {
            value: s.to_string(),
        };
        let parts: Vec<u64> = s
            .trim()
            .split(':')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<std::result::Result<_, _>>()?;

        let &[hours, minutes, seconds, millis] = parts.as_slice() else {
            return Err(invalid());
        };
        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(invalid());
        }
        let whole_seconds = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .ok_or_else(invalid)?;
        Ok(Timestamp(whole_seconds as f64 + millis as f64 / 1000.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_millis = (self.0 * 1000.0).round() as u64;
        let millis = total_millis % 1000;
        let total_seconds = total_millis / 1000;
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            total_seconds / 3600,
            (total_seconds / 60) % 60,
            total_seconds % 60,
            millis
        )
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ParameterError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeParams {
    pub duration: f64,
    pub speed_curve: SpeedCurve,
}

impl Default for CrossfadeParams {
    fn default() -> Self {
        Self {
            duration: 2.0,
            speed_curve: SpeedCurve::Sigmoid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeParams {
    pub duration: f64,
    pub direction: WipeDirection,
}

impl Default for WipeParams {
    fn default() -> Self {
        Self {
            duration: 2.0,
            direction: WipeDirection::LeftToRight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomParams {
    pub duration: f64,
    /// Number of earlier samples averaged into each zoomed frame (0 disables)
    pub motion_blur: u32,
    pub speed_curve: SpeedCurve,
}

impl Default for ZoomParams {
    fn default() -> Self {
        Self {
            duration: 0.25,
            motion_blur: 10,
            speed_curve: SpeedCurve::Linear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomWarpParams {
    pub duration: f64,
    pub motion_blur: u32,
    pub speed_curve: SpeedCurve,
    /// Peak radial distortion strength, 0.0 to 1.0
    pub distortion_factor: f64,
    /// Distortion applied to the outgoing and incoming clip respectively
    #[serde(alias = "distortion_type")]
    pub distortion_types: [DistortionType; 2],
}

impl Default for ZoomWarpParams {
    fn default() -> Self {
        Self {
            duration: 0.5,
            motion_blur: 10,
            speed_curve: SpeedCurve::Sigmoid,
            distortion_factor: 0.75,
            distortion_types: [DistortionType::Pinch, DistortionType::Bulge],
        }
    }
}

impl ZoomWarpParams {
    pub fn validate(&self) -> Result<()> {
        check_duration("duration", self.duration)?;
        check_unit_interval("distortion_factor", self.distortion_factor)
    }

    pub fn zoom(&self) -> ZoomParams {
        ZoomParams {
            duration: self.duration,
            motion_blur: self.motion_blur,
            speed_curve: self.speed_curve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DipParams {
    pub duration: f64,
    pub speed_curve: SpeedCurve,
    /// Color shown between the two clips
    pub color: Color,
}

impl Default for DipParams {
    fn default() -> Self {
        Self {
            duration: 1.0,
            speed_curve: SpeedCurve::Linear,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatParams {
    /// Amount cut from the end of the first clip
    #[serde(alias = "trim_end_clip1", skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<Timestamp>,
    /// Amount cut from the start of the second clip
    #[serde(alias = "trim_start_clip2", skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    pub duration: f64,
    /// Peak blur strength, 0.0 to 1.0 (1.0 is a sigma of 15 pixels)
    pub max_blur: f64,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            duration: 1.0,
            max_blur: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideParams {
    pub duration: f64,
    pub speed_curve: SpeedCurve,
}

impl Default for SlideParams {
    fn default() -> Self {
        Self {
            duration: 1.0,
            speed_curve: SpeedCurve::Sigmoid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideWarpParams {
    pub duration: f64,
    pub speed_curve: SpeedCurve,
    /// Fraction of the frame width the trailing edge is pulled in by at peak
    pub stretch_intensity: f64,
}

impl Default for SlideWarpParams {
    fn default() -> Self {
        Self {
            duration: 1.0,
            speed_curve: SpeedCurve::Sigmoid,
            stretch_intensity: 0.3,
        }
    }
}

impl SlideWarpParams {
    pub fn validate(&self) -> Result<()> {
        check_duration("duration", self.duration)?;
        check_unit_interval("stretch_intensity", self.stretch_intensity)
    }

    pub fn slide(&self) -> SlideParams {
        SlideParams {
            duration: self.duration,
            speed_curve: self.speed_curve,
        }
    }
}

impl BlurParams {
    pub fn validate(&self) -> Result<()> {
        check_duration("duration", self.duration)?;
        check_unit_interval("max_blur", self.max_blur)
    }
}

/// Parameters used for a transition kind when a request does not override them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDefaults {
    pub crossfade: CrossfadeParams,
    pub wipe: WipeParams,
    pub zoom: ZoomParams,
    pub zoom_warp: ZoomWarpParams,
    pub dip_to_black: DipParams,
    pub concatenate: ConcatParams,
    pub blur: BlurParams,
    pub slide: SlideParams,
    pub slide_warp: SlideWarpParams,
}
