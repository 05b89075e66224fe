use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    transitions::{TransitionDefaults, TransitionKind, TransitionSpec},
    video::VideoParams,
};

/// Main configuration for the Ad-Compositor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Encoding settings and external tool locations
    pub video: VideoConfig,

    /// Parameters used when a merge request names a transition without overriding them
    pub transitions: TransitionDefaults,

    /// Merge orchestration settings
    pub merge: MergeConfig,

    /// Overlay compositor settings
    pub overlay: OverlayConfig,

    /// Upstream segment generation settings
    pub generation: GenerationConfig,

    /// Frame extraction settings
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        validate_transitions(&self.transitions)?;
        self.merge.validate()?;
        self.generation.validate()?;
        self.extraction.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> crate::error::CompositorError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn validate_transitions(defaults: &TransitionDefaults) -> Result<()> {
    for kind in TransitionKind::ALL {
        TransitionSpec::from_defaults(kind, defaults)
            .validate()
            .map_err(|e| invalid(&format!("transitions.{}", kind.tag().to_ascii_lowercase()), e))?;
    }
    Ok(())
}

/// Video encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Encoder parameters
    pub params: VideoParams,

    /// ffmpeg executable, looked up on PATH when not absolute
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable, looked up on PATH when not absolute
    pub ffprobe_path: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            params: VideoParams::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if !self.params.fps.is_finite() || self.params.fps <= 0.0 {
            return Err(invalid("video.params.fps", self.params.fps));
        }

        if self.params.quality > 100 {
            return Err(invalid("video.params.quality", self.params.quality));
        }

        if self.params.codec.trim().is_empty() {
            return Err(invalid("video.params.codec", &self.params.codec));
        }

        if self.params.audio_sample_rate == 0 {
            return Err(invalid("video.params.audio_sample_rate", self.params.audio_sample_rate));
        }

        Ok(())
    }
}

/// Merge orchestration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Directory the final video (and any intermediates) are written to
    pub output_dir: PathBuf,

    /// Also write the result of every pairwise merge step
    pub keep_intermediates: bool,

    /// Join with a plain cut when a segment names an unknown transition
    pub fallback_to_concatenate: bool,

    /// File name prefix of the final video, followed by a timestamp
    pub final_name_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            keep_intermediates: false,
            fallback_to_concatenate: false,
            final_name_prefix: "final_video".to_string(),
        }
    }
}

impl MergeConfig {
    fn validate(&self) -> Result<()> {
        let prefix = self.final_name_prefix.trim();
        if prefix.is_empty() || prefix.contains(['/', '\\']) {
            return Err(invalid("merge.final_name_prefix", &self.final_name_prefix));
        }
        Ok(())
    }
}

/// Overlay compositor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Font used by text overlays that do not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_font: Option<PathBuf>,
}

/// Upstream segment generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Segments generated concurrently
    pub max_workers: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(invalid("generation.max_workers", self.max_workers));
        }
        Ok(())
    }
}

/// Frame extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rate frames are sampled at
    pub sample_fps: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { sample_fps: 24.0 }
    }
}

impl ExtractionConfig {
    fn validate(&self) -> Result<()> {
        if !self.sample_fps.is_finite() || self.sample_fps <= 0.0 {
            return Err(invalid("extraction.sample_fps", self.sample_fps));
        }
        Ok(())
    }
}
