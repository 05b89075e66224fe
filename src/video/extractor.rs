//! # Frame Extraction
//!
//! Samples a handful of frames from a clip for thumbnails and review.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CompositorError, ParameterError, Result};
use crate::video::source::FrameSource;
use crate::video::types::{Clip, Frame};

/// Up to `count` frames starting at `start` seconds, one every `1 / sample_fps` seconds.
///
/// Sampling stops early at the end of the clip, so fewer than `count` frames
/// may be returned.
pub fn sample_frames(clip: &Clip, start: f64, count: usize, sample_fps: f64) -> Result<Vec<Arc<Frame>>> {
    if !start.is_finite() || start < 0.0 || start >= clip.duration() {
        return Err(ParameterError::OutOfRange {
            name: "start".to_string(),
            value: start.to_string(),
            expected: format!("0 <= start < {:.3}", clip.duration()),
        }
        .into());
    }
    if count == 0 {
        return Err(ParameterError::OutOfRange {
            name: "count".to_string(),
            value: count.to_string(),
            expected: ">= 1".to_string(),
        }
        .into());
    }
    if !sample_fps.is_finite() || sample_fps <= 0.0 {
        return Err(ParameterError::OutOfRange {
            name: "sample_fps".to_string(),
            value: sample_fps.to_string(),
            expected: "> 0".to_string(),
        }
        .into());
    }

    let frames = (0..count)
        .map(|i| start + i as f64 / sample_fps)
        .take_while(|t| *t < clip.duration())
        .map(|t| Arc::clone(clip.frame_at(t)))
        .collect();
    Ok(frames)
}

/// Decode `video`, sample frames from it and write them as
/// `frame_001.png`, `frame_002.png`, ... into `output_dir`.
pub fn extract_frames<S: FrameSource + ?Sized>(
    source: &S,
    video: &Path,
    start: f64,
    count: usize,
    output_dir: &Path,
    sample_fps: f64,
) -> Result<Vec<PathBuf>> {
    let clip = source.open_clip(video)?;
    let frames = sample_frames(&clip, start, count, sample_fps)?;

    std::fs::create_dir_all(output_dir)
        .map_err(|e| CompositorError::sink_write(output_dir, e.to_string()))?;

    let mut written = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let path = output_dir.join(format!("frame_{:03}.png", i + 1));
        frame
            .save_png(&path)
            .map_err(|e| CompositorError::sink_write(&path, e.to_string()))?;
        debug!("Saved {}", path.display());
        written.push(path);
    }

    info!(
        "Extracted {} frame(s) from {} starting at {:.3}s",
        written.len(),
        video.display(),
        start
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{numbered_clip, MemoryFrameSource};

    #[test]
    fn test_sample_frames_steps_by_sample_rate() {
        // Frame i of a numbered clip has red channel i
        let clip = numbered_clip(48, 24.0);
        let frames = sample_frames(&clip, 0.5, 3, 12.0).unwrap();
        let reds: Vec<u8> = frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect();
        assert_eq!(reds, vec![12, 14, 16]);
    }

    #[test]
    fn test_sample_frames_stops_at_clip_end() {
        let clip = numbered_clip(24, 24.0);
        let frames = sample_frames(&clip, 0.9, 10, 24.0).unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_sample_frames_rejects_bad_input() {
        let clip = numbered_clip(24, 24.0);
        assert!(sample_frames(&clip, 1.0, 1, 24.0).is_err());
        assert!(sample_frames(&clip, -0.1, 1, 24.0).is_err());
        assert!(sample_frames(&clip, 0.0, 0, 24.0).is_err());
        assert!(sample_frames(&clip, 0.0, 1, 0.0).is_err());
    }

    #[test]
    fn test_extract_frames_writes_numbered_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryFrameSource::new();
        source.insert("clip.mp4", numbered_clip(24, 24.0));

        let out = dir.path().join("frames");
        let written =
            extract_frames(&source, Path::new("clip.mp4"), 0.0, 2, &out, 24.0).unwrap();

        assert_eq!(written.len(), 2);
        assert!(out.join("frame_001.png").exists());
        assert!(out.join("frame_002.png").exists());
        let decoded = image::open(out.join("frame_002.png")).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0[0], 1);
    }
}
