//! Frame bookkeeping shared by the transitions.
//!
//! All transitions output at the first clip's frame rate. The second clip is
//! re-timed to that rate first, and transition durations are quantised to
//! whole frames.

use std::sync::Arc;

use crate::error::{ParameterError, Result};
use crate::transitions::params::check_duration;
use crate::video::audio::AudioTrack;
use crate::video::types::{Clip, Frame};

/// Slack allowed when comparing a transition duration against a clip duration
const DURATION_TOLERANCE: f64 = 1e-6;

/// Reject clips of different sizes
pub(crate) fn check_same_size(clip1: &Clip, clip2: &Clip) -> Result<()> {
    if clip1.size() != clip2.size() {
        return Err(ParameterError::FrameSizeMismatch {
            left: clip1.size(),
            right: clip2.size(),
        }
        .into());
    }
    Ok(())
}

/// Reject a transition duration longer than either clip
pub(crate) fn check_fits(duration: f64, clip1: &Clip, clip2: &Clip) -> Result<()> {
    check_duration("duration", duration)?;
    let shortest = clip1.duration().min(clip2.duration());
    if duration > shortest + DURATION_TOLERANCE {
        return Err(ParameterError::DurationExceedsClip {
            duration,
            clip_duration: shortest,
        }
        .into());
    }
    Ok(())
}

/// Number of whole frames covering `seconds` at `fps`, capped at `limit`
pub(crate) fn frames_for(seconds: f64, fps: f64, limit: usize) -> usize {
    ((seconds * fps).round().max(0.0) as usize).min(limit)
}

/// One output frame inside an overlap window
pub(crate) struct WindowFrame<'a> {
    /// Linear progress through the window, `0 <= progress < 1`
    pub progress: f64,
    pub outgoing: &'a Arc<Frame>,
    pub incoming: &'a Arc<Frame>,
    /// Time of `outgoing` within the first clip, in seconds
    pub outgoing_time: f64,
    /// Time of `incoming` within the second clip, in seconds
    pub incoming_time: f64,
}

/// Two clips laid end to end with their last/first `frames` frames overlapping.
///
/// Output frame `i` is the first clip's frame before the window, the second
/// clip's frame after the first clip ends, and a synthesized frame in between.
pub(crate) struct Overlap {
    pub clip1: Clip,
    pub clip2: Clip,
    /// Length of the window in frames
    pub frames: usize,
    /// Index of the first window frame in the output
    pub start: usize,
}

impl Overlap {
    pub fn new(clip1: &Clip, clip2: &Clip, duration: f64) -> Result<Self> {
        check_same_size(clip1, clip2)?;
        check_fits(duration, clip1, clip2)?;

        let clip2 = clip2.resampled(clip1.fps())?;
        let frames = frames_for(
            duration,
            clip1.fps(),
            clip1.frame_count().min(clip2.frame_count()),
        );
        Ok(Self {
            start: clip1.frame_count() - frames,
            clip1: clip1.clone(),
            clip2,
            frames,
        })
    }

    pub fn fps(&self) -> f64 {
        self.clip1.fps()
    }

    pub fn output_frame_count(&self) -> usize {
        self.clip1.frame_count() + self.clip2.frame_count() - self.frames
    }

    /// Assemble the output clip, calling `synthesize` for every window frame in order.
    ///
    /// Audio follows the cut: the first clip's audio up to the window start,
    /// then the second clip's audio in full.
    pub fn compose<F>(&self, mut synthesize: F) -> Result<Clip>
    where
        F: FnMut(&WindowFrame<'_>) -> Result<Frame>,
    {
        let fps = self.fps();
        let mut output: Vec<Arc<Frame>> = Vec::with_capacity(self.output_frame_count());
        output.extend(self.clip1.frames()[..self.start].iter().cloned());

        for k in 0..self.frames {
            let outgoing_index = self.start + k;
            let window = WindowFrame {
                progress: k as f64 / self.frames as f64,
                outgoing: &self.clip1.frames()[outgoing_index],
                incoming: &self.clip2.frames()[k],
                outgoing_time: outgoing_index as f64 / fps,
                incoming_time: k as f64 / fps,
            };
            output.push(Arc::new(synthesize(&window)?));
        }

        output.extend(self.clip2.frames()[self.frames..].iter().cloned());

        let audio = self
            .clip1
            .audio()
            .truncated(self.start as f64 / fps)
            .then(self.clip2.audio());
        Ok(Clip::from_shared(output, fps)?.with_audio(audio))
    }
}

/// Play `head` then `tail` back to back at `head`'s frame rate, with both audio tracks in full
pub(crate) fn sequence(
    fps: f64,
    head: Vec<Arc<Frame>>,
    tail: Vec<Arc<Frame>>,
    head_audio: &AudioTrack,
    tail_audio: &AudioTrack,
) -> Result<Clip> {
    let mut frames = head;
    frames.extend(tail);
    let audio = head_audio.then(tail_audio);
    Ok(Clip::from_shared(frames, fps)?.with_audio(audio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{numbered_clip, solid_clip};

    #[test]
    fn test_overlap_layout() {
        let clip1 = numbered_clip(48, 24.0);
        let clip2 = numbered_clip(24, 24.0);
        let overlap = Overlap::new(&clip1, &clip2, 0.5).unwrap();
        assert_eq!(overlap.frames, 12);
        assert_eq!(overlap.start, 36);
        assert_eq!(overlap.output_frame_count(), 60);

        let mut seen = Vec::new();
        let clip = overlap
            .compose(|w| {
                seen.push(w.progress);
                Ok(Frame::new_black(64, 36))
            })
            .unwrap();
        assert_eq!(clip.frame_count(), 60);
        assert_eq!(seen.len(), 12);
        assert_eq!(seen[0], 0.0);
        assert!(seen[11] < 1.0);
        // Frames after the window come from the second clip, offset by the window
        assert_eq!(clip.frames()[59].get_pixel(0, 0)[0], 23);
        assert_eq!(clip.frames()[48].get_pixel(0, 0)[0], 12);
    }

    #[test]
    fn test_overlap_rejects_long_duration() {
        let clip1 = solid_clip([0, 0, 0], 1.0);
        let clip2 = solid_clip([0, 0, 0], 2.0);
        let err = Overlap::new(&clip1, &clip2, 1.5).err().unwrap();
        assert!(err.to_string().contains("exceeds clip duration"));
        assert!(Overlap::new(&clip1, &clip2, 1.0).is_ok());
    }

    #[test]
    fn test_overlap_rejects_size_mismatch() {
        let clip1 = solid_clip([0, 0, 0], 1.0);
        let clip2 = Clip::solid(32, 18, [0, 0, 0], 24.0, 1.0).unwrap();
        assert!(Overlap::new(&clip1, &clip2, 0.5).is_err());
    }

    #[test]
    fn test_overlap_resamples_second_clip() {
        let clip1 = solid_clip([0, 0, 0], 1.0);
        let clip2 = Clip::solid(64, 36, [9, 9, 9], 30.0, 1.0).unwrap();
        let overlap = Overlap::new(&clip1, &clip2, 0.25).unwrap();
        assert_eq!(overlap.clip2.frame_count(), 24);
        assert_eq!(overlap.frames, 6);
    }
}
