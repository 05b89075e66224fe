//! # Transition Engine
//!
//! Pure functions `(clip1, clip2, params) -> Clip` joining two clips. None of
//! them mutate their inputs; frames outside the transition window are shared
//! with the source clips rather than copied.
//!
//! ## Kinds
//!
//! Overlap kinds play both clips at once during the window and produce
//! `d1 + d2 - duration` seconds:
//!
//! - **X_FADE**: weighted blend under a speed curve
//! - **WIPE**: a hard edge sweeping across the frame
//! - **ZOOM** / **ZOOM_WARP**: zoom in and out with motion blur, optionally with a radial warp
//! - **SLIDE** / **SLIDE_WARP**: horizontal push with a blur peak, optionally with a perspective squeeze
//!
//! Sequential kinds never mix pixels from both clips and produce `d1 + d2`
//! seconds (less any trims):
//!
//! - **DIP_TO_BLACK**: fade out to a color, fade back in
//! - **BLUR**: defocus out, refocus in
//! - **FLICKER**: two zoomed, blurred flash frames before the cut
//! - **CONCATENATE**: a straight cut with optional trims
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ad_compositor::transitions::{apply_transition, TransitionSpec};
//! use ad_compositor::video::Clip;
//!
//! # fn demo(red: Clip, blue: Clip) -> ad_compositor::Result<()> {
//! let spec: TransitionSpec = serde_json::from_str(r#"{"type": "X_FADE", "duration": 0.5}"#)
//!     .map_err(|e| ad_compositor::CompositorError::generic(e.to_string()))?;
//! let joined = apply_transition(&red, &blue, &spec)?;
//! assert!((joined.duration() - (red.duration() + blue.duration() - 0.5)).abs() < 0.05);
//! # Ok(())
//! # }
//! ```

pub mod blur;
pub mod concat;
pub mod crossfade;
pub mod curves;
pub mod dip;
pub mod flicker;
pub mod ops;
pub mod params;
pub mod slide;
pub mod wipe;
pub mod zoom;

mod window;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{CompositorError, ParameterError, Result};
use crate::video::types::Clip;

pub use curves::{curve, SpeedCurve};
pub use params::{
    BlurParams, ConcatParams, CrossfadeParams, DipParams, DistortionType, SlideParams,
    SlideWarpParams, Timestamp, TransitionDefaults, WipeDirection, WipeParams, ZoomParams,
    ZoomWarpParams,
};

use params::check_duration;

/// The ten transition kinds, by their request tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Crossfade,
    Wipe,
    Zoom,
    ZoomWarp,
    DipToBlack,
    Concatenate,
    Blur,
    Flicker,
    Slide,
    SlideWarp,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 10] = [
        TransitionKind::Crossfade,
        TransitionKind::Wipe,
        TransitionKind::Zoom,
        TransitionKind::ZoomWarp,
        TransitionKind::DipToBlack,
        TransitionKind::Concatenate,
        TransitionKind::Blur,
        TransitionKind::Flicker,
        TransitionKind::Slide,
        TransitionKind::SlideWarp,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            TransitionKind::Crossfade => "X_FADE",
            TransitionKind::Wipe => "WIPE",
            TransitionKind::Zoom => "ZOOM",
            TransitionKind::ZoomWarp => "ZOOM_WARP",
            TransitionKind::DipToBlack => "DIP_TO_BLACK",
            TransitionKind::Concatenate => "CONCATENATE",
            TransitionKind::Blur => "BLUR",
            TransitionKind::Flicker => "FLICKER",
            TransitionKind::Slide => "SLIDE",
            TransitionKind::SlideWarp => "SLIDE_WARP",
        }
    }

    /// Look up a kind by tag, ignoring case and surrounding whitespace
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag))
    }

    /// Sequential kinds play the clips back to back instead of overlapping them
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            TransitionKind::DipToBlack
                | TransitionKind::Concatenate
                | TransitionKind::Blur
                | TransitionKind::Flicker
        )
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TransitionKind {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| CompositorError::UnsupportedTransition {
            name: s.to_string(),
        })
    }
}

/// A transition kind together with its parameters.
///
/// Serialized with the kind in a `type` field and the parameters alongside it,
/// e.g. `{"type": "WIPE", "direction": "top-to-bottom"}`. Parameters a request
/// leaves out take their built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransitionSpec {
    #[serde(rename = "X_FADE")]
    Crossfade(CrossfadeParams),
    #[serde(rename = "WIPE")]
    Wipe(WipeParams),
    #[serde(rename = "ZOOM")]
    Zoom(ZoomParams),
    #[serde(rename = "ZOOM_WARP")]
    ZoomWarp(ZoomWarpParams),
    #[serde(rename = "DIP_TO_BLACK")]
    DipToBlack(DipParams),
    #[serde(rename = "CONCATENATE")]
    Concatenate(ConcatParams),
    #[serde(rename = "BLUR")]
    Blur(BlurParams),
    #[serde(rename = "FLICKER")]
    Flicker,
    #[serde(rename = "SLIDE")]
    Slide(SlideParams),
    #[serde(rename = "SLIDE_WARP")]
    SlideWarp(SlideWarpParams),
}

impl Default for TransitionSpec {
    fn default() -> Self {
        TransitionSpec::Concatenate(ConcatParams::default())
    }
}

impl TransitionSpec {
    pub fn kind(&self) -> TransitionKind {
        match self {
            TransitionSpec::Crossfade(_) => TransitionKind::Crossfade,
            TransitionSpec::Wipe(_) => TransitionKind::Wipe,
            TransitionSpec::Zoom(_) => TransitionKind::Zoom,
            TransitionSpec::ZoomWarp(_) => TransitionKind::ZoomWarp,
            TransitionSpec::DipToBlack(_) => TransitionKind::DipToBlack,
            TransitionSpec::Concatenate(_) => TransitionKind::Concatenate,
            TransitionSpec::Blur(_) => TransitionKind::Blur,
            TransitionSpec::Flicker => TransitionKind::Flicker,
            TransitionSpec::Slide(_) => TransitionKind::Slide,
            TransitionSpec::SlideWarp(_) => TransitionKind::SlideWarp,
        }
    }

    /// Transition duration in seconds, `None` for the kinds that have none
    pub fn duration(&self) -> Option<f64> {
        match self {
            TransitionSpec::Crossfade(p) => Some(p.duration),
            TransitionSpec::Wipe(p) => Some(p.duration),
            TransitionSpec::Zoom(p) => Some(p.duration),
            TransitionSpec::ZoomWarp(p) => Some(p.duration),
            TransitionSpec::DipToBlack(p) => Some(p.duration),
            TransitionSpec::Blur(p) => Some(p.duration),
            TransitionSpec::Slide(p) => Some(p.duration),
            TransitionSpec::SlideWarp(p) => Some(p.duration),
            TransitionSpec::Concatenate(_) | TransitionSpec::Flicker => None,
        }
    }

    /// Check parameters that do not depend on the clips
    pub fn validate(&self) -> Result<()> {
        match self {
            TransitionSpec::ZoomWarp(p) => p.validate(),
            TransitionSpec::Blur(p) => p.validate(),
            TransitionSpec::SlideWarp(p) => p.validate(),
            other => match other.duration() {
                Some(duration) => check_duration("duration", duration),
                None => Ok(()),
            },
        }
    }

    /// The configured default parameters for `kind`
    pub fn from_defaults(kind: TransitionKind, defaults: &TransitionDefaults) -> Self {
        match kind {
            TransitionKind::Crossfade => TransitionSpec::Crossfade(defaults.crossfade.clone()),
            TransitionKind::Wipe => TransitionSpec::Wipe(defaults.wipe.clone()),
            TransitionKind::Zoom => TransitionSpec::Zoom(defaults.zoom.clone()),
            TransitionKind::ZoomWarp => TransitionSpec::ZoomWarp(defaults.zoom_warp.clone()),
            TransitionKind::DipToBlack => TransitionSpec::DipToBlack(defaults.dip_to_black.clone()),
            TransitionKind::Concatenate => TransitionSpec::Concatenate(defaults.concatenate.clone()),
            TransitionKind::Blur => TransitionSpec::Blur(defaults.blur.clone()),
            TransitionKind::Flicker => TransitionSpec::Flicker,
            TransitionKind::Slide => TransitionSpec::Slide(defaults.slide.clone()),
            TransitionKind::SlideWarp => TransitionSpec::SlideWarp(defaults.slide_warp.clone()),
        }
    }

    /// Build a spec for `tag`, starting from the configured defaults and
    /// replacing any parameter present in `overrides`.
    ///
    /// A `type` key in `overrides` is ignored; `tag` decides the kind.
    pub fn resolve(tag: &str, overrides: &Map<String, Value>, defaults: &TransitionDefaults) -> Result<Self> {
        let kind: TransitionKind = tag.parse()?;
        let base = Self::from_defaults(kind, defaults);
        if overrides.keys().all(|key| key == "type") {
            return Ok(base);
        }

        let malformed = |reason: String| ParameterError::Malformed {
            context: format!("{} parameters", kind),
            reason,
        };

        let mut fields = match serde_json::to_value(&base) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => return Err(malformed(format!("unexpected default encoding {}", other)).into()),
            Err(e) => return Err(malformed(e.to_string()).into()),
        };
        for (key, value) in overrides.iter().filter(|(key, _)| key.as_str() != "type") {
            fields.insert(key.clone(), value.clone());
        }

        let spec: Self = serde_json::from_value(Value::Object(fields)).map_err(|e| malformed(e.to_string()))?;
        spec.validate()?;
        debug!("Resolved {} with {} override(s)", kind, overrides.len());
        Ok(spec)
    }
}

/// Join `clip1` and `clip2` with the transition described by `spec`.
///
/// Parameters are checked before any frame is synthesized.
pub fn apply_transition(clip1: &Clip, clip2: &Clip, spec: &TransitionSpec) -> Result<Clip> {
    spec.validate()?;
    info!(
        "Applying {} to clips of {:.2}s and {:.2}s",
        spec.kind(),
        clip1.duration(),
        clip2.duration()
    );

    let joined = match spec {
        TransitionSpec::Crossfade(p) => crossfade::crossfade(clip1, clip2, p),
        TransitionSpec::Wipe(p) => wipe::wipe(clip1, clip2, p),
        TransitionSpec::Zoom(p) => zoom::zoom(clip1, clip2, p),
        TransitionSpec::ZoomWarp(p) => zoom::zoom_warp(clip1, clip2, p),
        TransitionSpec::DipToBlack(p) => dip::dip_to_color(clip1, clip2, p),
        TransitionSpec::Concatenate(p) => concat::concatenate(clip1, clip2, p),
        TransitionSpec::Blur(p) => blur::blur(clip1, clip2, p),
        TransitionSpec::Flicker => flicker::flicker(clip1, clip2),
        TransitionSpec::Slide(p) => slide::slide(clip1, clip2, p),
        TransitionSpec::SlideWarp(p) => slide::slide_warp(clip1, clip2, p),
    }?;

    debug!("{} produced {} frames ({:.2}s)", spec.kind(), joined.frame_count(), joined.duration());
    Ok(joined)
}
