use tracing::debug;

use crate::error::{ParameterError, Result};
use crate::transitions::params::ConcatParams;
use crate::transitions::window::{check_same_size, sequence};
use crate::video::types::Clip;

/// Cut `amount` seconds off one end of `clip`, failing if nothing would remain
fn trim(clip: &Clip, amount: f64, from_end: bool, name: &str) -> Result<Clip> {
    let removed = (amount * clip.fps()).round() as usize;
    if amount >= clip.duration() || removed >= clip.frame_count() {
        return Err(ParameterError::TrimExceedsClip {
            clip: name.to_string(),
            trim: amount,
            clip_duration: clip.duration(),
        }
        .into());
    }
    if from_end {
        clip.slice(0, clip.frame_count() - removed)
    } else {
        clip.slice(removed, clip.frame_count())
    }
}

/// Straight cut from `clip1` to `clip2`, optionally trimming the tail of
/// `clip1` and the head of `clip2` first.
pub fn concatenate(clip1: &Clip, clip2: &Clip, params: &ConcatParams) -> Result<Clip> {
    check_same_size(clip1, clip2)?;

    let head = match params.trim_end {
        Some(ts) => trim(clip1, ts.seconds(), true, "clip1")?,
        None => clip1.clone(),
    };
    let tail = match params.trim_start {
        Some(ts) => trim(clip2, ts.seconds(), false, "clip2")?,
        None => clip2.clone(),
    };
    let tail = tail.resampled(head.fps())?;

    debug!(
        "Concatenating {} + {} frames",
        head.frame_count(),
        tail.frame_count()
    );
    sequence(
        head.fps(),
        head.frames().to_vec(),
        tail.frames().to_vec(),
        head.audio(),
        tail.audio(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::params::Timestamp;
    use crate::testing::{numbered_clip, solid_clip};
    use crate::video::audio::AudioTrack;

    #[test]
    fn test_concatenation_is_exact() {
        let clip1 = numbered_clip(30, 24.0);
        let clip2 = solid_clip([0, 0, 255], 1.0);
        let out = concatenate(&clip1, &clip2, &ConcatParams::default()).unwrap();

        assert!((out.duration() - (clip1.duration() + clip2.duration())).abs() < 1e-9);
        assert_eq!(out.frames()[0], clip1.frames()[0]);
        assert_eq!(out.last_frame(), clip2.last_frame());
        // Untouched frames are shared, not copied
        assert!(std::sync::Arc::ptr_eq(&out.frames()[5], &clip1.frames()[5]));
    }

    #[test]
    fn test_trims_remove_frames() {
        let clip1 = numbered_clip(48, 24.0);
        let clip2 = numbered_clip(48, 24.0);
        let params = ConcatParams {
            trim_end: Some("00:00:00:500".parse().unwrap()),
            trim_start: Some("00:00:01:000".parse().unwrap()),
        };
        let out = concatenate(&clip1, &clip2, &params).unwrap();

        assert_eq!(out.frame_count(), 36 + 24);
        assert_eq!(out.frames()[35].get_pixel(0, 0)[0], 35);
        assert_eq!(out.frames()[36].get_pixel(0, 0)[0], 24);
    }

    #[test]
    fn test_trim_exceeding_clip_is_rejected() {
        let clip1 = solid_clip([0, 0, 0], 1.0);
        let clip2 = solid_clip([0, 0, 0], 1.0);
        let params = ConcatParams {
            trim_end: Some(Timestamp::from_seconds(1.0)),
            trim_start: None,
        };
        let err = concatenate(&clip1, &clip2, &params).unwrap_err();
        assert!(err.to_string().contains("clip1"));
    }

    #[test]
    fn test_audio_is_joined_after_trims() {
        let clip1 = solid_clip([0, 0, 0], 2.0).with_audio(AudioTrack::from_source("a.mp4", 2.0));
        let clip2 = solid_clip([0, 0, 0], 2.0).with_audio(AudioTrack::from_source("b.mp4", 2.0));
        let params = ConcatParams {
            trim_end: Some(Timestamp::from_seconds(0.5)),
            trim_start: None,
        };
        let out = concatenate(&clip1, &clip2, &params).unwrap();
        assert!((out.audio().duration() - 3.5).abs() < 1e-6);
        assert_eq!(out.audio().spans().len(), 2);
    }
}
