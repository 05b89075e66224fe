//! # Frame Source
//!
//! The only boundary through which the compositor touches encoded media.
//! Everything above it works on decoded [`Clip`]s.

use std::path::Path;

use tracing::info;

use crate::config::VideoConfig;
use crate::error::{MediaError, Result};
use crate::video::loader::{run_tool, ClipLoader};
use crate::video::types::Clip;
use crate::video::writer::{ClipWriter, WrittenClip};

/// Decodes stored videos into clips and encodes clips back to files.
///
/// Implementations must not retry failed I/O; read and write failures are
/// reported as [`MediaError`]s and left to the caller.
pub trait FrameSource: Send + Sync {
    /// Decode the video at `path`
    fn open_clip(&self, path: &Path) -> Result<Clip>;

    /// Encode `clip` to `path` at the clip's own frame rate
    fn write_clip(&self, clip: &Clip, path: &Path) -> Result<WrittenClip>;
}

/// [`FrameSource`] backed by the ffmpeg and ffprobe command line tools
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    loader: ClipLoader,
    writer: ClipWriter,
}

impl FfmpegFrameSource {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            loader: ClipLoader::new(&config.ffmpeg_path, &config.ffprobe_path),
            writer: ClipWriter::new(&config.ffmpeg_path, config.params.clone()),
        }
    }

    pub fn loader(&self) -> &ClipLoader {
        &self.loader
    }

    /// Check that both tools can be started
    pub fn check_available(config: &VideoConfig) -> Result<()> {
        for tool in [&config.ffmpeg_path, &config.ffprobe_path] {
            let output = run_tool(tool, std::process::Command::new(tool).arg("-version"))?;
            if !output.status.success() {
                return Err(MediaError::ToolUnavailable {
                    tool: tool.display().to_string(),
                }
                .into());
            }
        }
        info!("Found ffmpeg and ffprobe");
        Ok(())
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new(&VideoConfig::default())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open_clip(&self, path: &Path) -> Result<Clip> {
        self.loader.load(path)
    }

    fn write_clip(&self, clip: &Clip, path: &Path) -> Result<WrittenClip> {
        self.writer.write(clip, path)
    }
}
