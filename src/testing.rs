//! Helpers shared by unit tests. Nothing here touches ffmpeg.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CompositorError, Result};
use crate::video::source::FrameSource;
use crate::video::types::{Clip, Frame};
use crate::video::writer::WrittenClip;

pub const TEST_WIDTH: u32 = 64;
pub const TEST_HEIGHT: u32 = 36;
pub const TEST_FPS: f64 = 24.0;

/// DejaVu Sans Mono, bundled for text rendering tests
pub const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSansMono.ttf");

/// A 64x36, 24fps clip of one color
pub fn solid_clip(color: [u8; 3], duration: f64) -> Clip {
    Clip::solid(TEST_WIDTH, TEST_HEIGHT, color, TEST_FPS, duration).unwrap()
}

/// A clip whose frame `i` is filled with `[i, 255 - i, 0]`
pub fn numbered_clip(count: usize, fps: f64) -> Clip {
    let frames = (0..count)
        .map(|i| {
            let i = i.min(255) as u8;
            Frame::new_filled(TEST_WIDTH, TEST_HEIGHT, [i, 255 - i, 0])
        })
        .collect();
    Clip::new(frames, fps).unwrap()
}

/// A single frame with a horizontal and vertical gradient, useful for geometry checks
pub fn pattern_frame(width: u32, height: u32) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        [
            (x * 255 / width.saturating_sub(1).max(1)) as u8,
            (y * 255 / height.saturating_sub(1).max(1)) as u8,
            128,
        ]
    })
}

/// In-memory [`FrameSource`] that records every write
#[derive(Default)]
pub struct MemoryFrameSource {
    clips: Mutex<HashMap<PathBuf, Clip>>,
    written: Mutex<Vec<(PathBuf, Clip)>>,
    fail_writes: bool,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose writes always fail
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn insert<P: Into<PathBuf>>(&self, path: P, clip: Clip) {
        self.clips.lock().unwrap().insert(path.into(), clip);
    }

    pub fn written(&self) -> Vec<(PathBuf, Clip)> {
        self.written.lock().unwrap().clone()
    }
}

impl FrameSource for MemoryFrameSource {
    fn open_clip(&self, path: &Path) -> Result<Clip> {
        self.clips
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| CompositorError::source_read(path, "no such clip"))
    }

    fn write_clip(&self, clip: &Clip, path: &Path) -> Result<WrittenClip> {
        if self.fail_writes {
            return Err(CompositorError::sink_write(path, "disk full"));
        }
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), clip.clone()));
        Ok(WrittenClip {
            path: path.to_path_buf(),
            duration: clip.duration(),
            frame_count: clip.frame_count(),
            file_size: 0,
        })
    }
}
