//! # Ad-Compositor
//!
//! Assemble short generated video segments into a single advertisement with
//! pixel-accurate transitions and text/logo overlays.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ad_compositor::{
//!     composition::{MergeOrchestrator, MergeOutcome, SegmentManifest},
//!     config::Config,
//!     video::FfmpegFrameSource,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let source = FfmpegFrameSource::new(&config.video);
//! let manifest = SegmentManifest::from_file("segments.json")?;
//!
//! let orchestrator = MergeOrchestrator::new(&config);
//! if let MergeOutcome::Merged(report) = orchestrator.merge_manifest(&source, &manifest)? {
//!     println!("wrote {:?}", report.output.path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`transitions`] - The transition engine: ten pure `(clip1, clip2) -> clip` joins
//! - [`composition`] - Merge orchestration and upstream segment generation
//! - [`overlay`] - Text and logo overlays
//! - [`video`] - Frames, clips, and the ffmpeg-backed frame source
//! - [`config`] - Configuration management
//!
//! ## Applying a Single Transition
//!
//! ```rust,no_run
//! use ad_compositor::transitions::{apply_transition, TransitionSpec, WipeParams, WipeDirection};
//! use ad_compositor::video::Clip;
//!
//! # fn main() -> ad_compositor::Result<()> {
//! let red = Clip::solid(640, 360, [255, 0, 0], 24.0, 2.0)?;
//! let blue = Clip::solid(640, 360, [0, 0, 255], 24.0, 2.0)?;
//! let spec = TransitionSpec::Wipe(WipeParams {
//!     duration: 1.0,
//!     direction: WipeDirection::TopToBottom,
//! });
//! let joined = apply_transition(&red, &blue, &spec)?;
//! assert_eq!(joined.frame_count(), 72);
//! # Ok(())
//! # }
//! ```

pub mod composition;
pub mod config;
pub mod error;
pub mod overlay;
pub mod transitions;
pub mod video;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{MergeOrchestrator, MergeOutcome},
    config::Config,
    error::{CompositorError, Result},
    overlay::OverlayCompositor,
    transitions::{apply_transition, TransitionKind, TransitionSpec},
    video::{Clip, Frame, FrameSource},
};
