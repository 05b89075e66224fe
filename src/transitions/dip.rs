use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::DipParams;
use crate::transitions::window::{check_fits, check_same_size, frames_for, sequence};
use crate::video::types::Clip;

/// `clip1` fades to a solid color over the first half of the transition,
/// then `clip2` fades up from it over the second half.
///
/// The clips play back to back, so the output lasts `d1 + d2`.
pub fn dip_to_color(clip1: &Clip, clip2: &Clip, params: &DipParams) -> Result<Clip> {
    check_same_size(clip1, clip2)?;
    check_fits(params.duration, clip1, clip2)?;

    let fps = clip1.fps();
    let clip2 = clip2.resampled(fps)?;
    let ease = params.speed_curve.function();
    let fade_frames = frames_for(params.duration / 2.0, fps, clip1.frame_count().min(clip2.frame_count()));
    debug!(
        "Dip to {} with {} frames of fade per side",
        params.color, fade_frames
    );

    let fade_start = clip1.frame_count() - fade_frames;
    let head = clip1
        .frames()
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            if i < fade_start {
                Arc::clone(frame)
            } else {
                let local = (i - fade_start) as f64 / fade_frames as f64;
                Arc::new(ops::fade_to_color(frame, params.color, 1.0 - ease(local)))
            }
        })
        .collect();

    let tail = clip2
        .frames()
        .iter()
        .enumerate()
        .map(|(k, frame)| {
            if k < fade_frames {
                let local = k as f64 / fade_frames as f64;
                Arc::new(ops::fade_to_color(frame, params.color, ease(local)))
            } else {
                Arc::clone(frame)
            }
        })
        .collect();

    sequence(fps, head, tail, clip1.audio(), clip2.audio())
}
