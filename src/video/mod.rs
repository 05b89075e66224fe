//! # Video Module
//!
//! Decoded frames and clips, and the ffmpeg boundary that reads and writes them.

pub mod audio;
pub mod extractor;
pub mod loader;
pub mod source;
pub mod types;
pub mod writer;

pub use audio::{AudioSpan, AudioTrack};
pub use extractor::{extract_frames, sample_frames};
pub use loader::{ClipLoader, ClipMetadata};
pub use source::{FfmpegFrameSource, FrameSource};
pub use types::{Clip, Color, Frame};
pub use writer::{ClipWriter, VideoParams, WrittenClip};
