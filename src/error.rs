use thiserror::Error;

/// Main error type for the Ad-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("Unsupported transition: {name}")]
    UnsupportedTransition { name: String },

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Segment generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Rejected caller input. Never retried and never silently corrected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("unknown speed curve '{name}' (expected one of: linear, quadratic, cubic, sigmoid)")]
    UnknownCurve { name: String },

    #[error("unknown wipe direction '{direction}' (expected one of: left-to-right, right-to-left, top-to-bottom, bottom-to-top)")]
    UnknownDirection { direction: String },

    #[error("unknown distortion type '{name}' (expected bulge or pinch)")]
    UnknownDistortion { name: String },

    #[error("unknown overlay position '{name}'")]
    UnknownPosition { name: String },

    #[error("unknown color '{value}'")]
    UnknownColor { value: String },

    #[error("{name} = {value} is out of range ({expected})")]
    OutOfRange {
        name: String,
        value: String,
        expected: String,
    },

    #[error("transition duration {duration:.3}s exceeds clip duration {clip_duration:.3}s")]
    DurationExceedsClip { duration: f64, clip_duration: f64 },

    #[error("trim of {trim:.3}s on {clip} exceeds clip duration {clip_duration:.3}s")]
    TrimExceedsClip {
        clip: String,
        trim: f64,
        clip_duration: f64,
    },

    #[error("invalid {context}: {reason}")]
    Malformed { context: String, reason: String },

    #[error("timestamp '{value}' must be formatted HH:MM:SS:mmm")]
    InvalidTimestamp { value: String },

    #[error("overlay window {start:.3}s + {duration:.3}s exceeds clip duration {clip_duration:.3}s")]
    OverlayExceedsClip {
        start: f64,
        duration: f64,
        clip_duration: f64,
    },

    #[error("fade duration {fade:.3}s twice over exceeds overlay duration {duration:.3}s")]
    FadeTooLong { fade: f64, duration: f64 },

    #[error("frame size mismatch: {left:?} vs {right:?}")]
    FrameSizeMismatch { left: (u32, u32), right: (u32, u32) },

    #[error("clip must contain at least {required} frame(s), found {found}")]
    NotEnoughFrames { required: usize, found: usize },

    #[error("frames in a clip must share one size, frame {index} is {found:?} instead of {expected:?}")]
    InconsistentFrames {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Failures at the Frame Source boundary, propagated unchanged.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to read {path}: {reason}")]
    SourceReadFailure { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    SinkWriteFailure { path: String, reason: String },

    #[error("External tool not available: {tool}")]
    ToolUnavailable { tool: String },
}

/// Failures reported by the external generative collaborator
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Segment {segment} failed to generate: {reason}")]
    SegmentFailed { segment: u32, reason: String },

    #[error("Generation worker stopped unexpectedly: {reason}")]
    WorkerPanicked { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Shorthand for a source read failure on `path`
    pub fn source_read<P: AsRef<std::path::Path>, S: Into<String>>(path: P, reason: S) -> Self {
        MediaError::SourceReadFailure {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
        .into()
    }

    /// Shorthand for a sink write failure on `path`
    pub fn sink_write<P: AsRef<std::path::Path>, S: Into<String>>(path: P, reason: S) -> Self {
        MediaError::SinkWriteFailure {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
        .into()
    }

    /// Check if this error is recoverable (can be retried by the caller)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Reads and remote generation might work on retry
            Self::Media(MediaError::SourceReadFailure { .. }) => true,
            Self::Generation(GenerationError::SegmentFailed { .. }) => true,
            // Everything else is a permanent failure of this request
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Media(MediaError::SourceReadFailure { path, .. }) => {
                format!("Could not read video file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Media(MediaError::ToolUnavailable { tool }) => {
                format!("'{}' was not found on PATH. Please install FFmpeg.", tool)
            }
            Self::UnsupportedTransition { name } => {
                format!(
                    "Transition '{}' is not supported. Available transitions: X_FADE, WIPE, ZOOM, ZOOM_WARP, DIP_TO_BLACK, CONCATENATE, BLUR, FLICKER, SLIDE, SLIDE_WARP",
                    name
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_errors_are_not_recoverable() {
        let err: CompositorError = ParameterError::UnknownCurve {
            name: "bouncy".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bouncy"));
    }

    #[test]
    fn test_source_read_is_recoverable() {
        let err = CompositorError::source_read("clip.mp4", "truncated stream");
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("clip.mp4"));
    }

    #[test]
    fn test_unsupported_transition_message_lists_kinds() {
        let err = CompositorError::UnsupportedTransition {
            name: "SPIRAL".to_string(),
        };
        assert!(err.user_message().contains("SLIDE_WARP"));
    }
}
