use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::BlurParams;
use crate::transitions::window::{check_fits, check_same_size, frames_for, sequence};
use crate::video::types::Clip;

/// Blur sigma, in pixels, at full strength
pub const MAX_BLUR_SIGMA: f64 = 15.0;

/// `clip1` goes out of focus over its last `duration / 2` seconds, then
/// `clip2` comes back into focus over its first `duration / 2` seconds.
///
/// Pixels are never mixed across clips; the output lasts `d1 + d2`.
pub fn blur(clip1: &Clip, clip2: &Clip, params: &BlurParams) -> Result<Clip> {
    params.validate()?;
    check_same_size(clip1, clip2)?;
    check_fits(params.duration, clip1, clip2)?;

    let fps = clip1.fps();
    let clip2 = clip2.resampled(fps)?;
    let max_sigma = MAX_BLUR_SIGMA * params.max_blur;
    let ramp = frames_for(params.duration / 2.0, fps, clip1.frame_count().min(clip2.frame_count()));
    debug!("Blur ramp of {} frames per side, peak sigma {:.1}", ramp, max_sigma);

    let ramp_start = clip1.frame_count() - ramp;
    let head = clip1
        .frames()
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            if i < ramp_start {
                Arc::clone(frame)
            } else {
                let progress = (i - ramp_start) as f64 / ramp as f64;
                Arc::new(ops::gaussian_blur(frame, max_sigma * progress))
            }
        })
        .collect();

    let tail = clip2
        .frames()
        .iter()
        .enumerate()
        .map(|(k, frame)| {
            if k < ramp {
                let progress = k as f64 / ramp as f64;
                Arc::new(ops::gaussian_blur(frame, max_sigma * (1.0 - progress)))
            } else {
                Arc::clone(frame)
            }
        })
        .collect();

    sequence(fps, head, tail, clip1.audio(), clip2.audio())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_clip;
    use crate::video::types::Frame;

    /// Sum of absolute differences between horizontally adjacent pixels
    fn sharpness(frame: &Frame) -> u64 {
        let mut total = 0u64;
        for y in 0..frame.height() {
            for x in 1..frame.width() {
                let a = frame.get_pixel(x - 1, y);
                let b = frame.get_pixel(x, y);
                total += (0..3).map(|c| (a[c] as i64 - b[c] as i64).unsigned_abs()).sum::<u64>();
            }
        }
        total
    }

    fn checker_clip(seconds: f64) -> Clip {
        let frame = Frame::from_fn(64, 36, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        });
        Clip::new(vec![frame; (seconds * 24.0) as usize], 24.0).unwrap()
    }

    #[test]
    fn test_blur_is_sequential_and_ramps() {
        let clip1 = checker_clip(1.0);
        let clip2 = checker_clip(1.0);
        let params = BlurParams {
            duration: 1.0,
            max_blur: 0.5,
        };
        let out = blur(&clip1, &clip2, &params).unwrap();
        assert_eq!(out.frame_count(), 48);

        // Sharp before the ramp, progressively blurrier inside it
        let reference = sharpness(&clip1.frames()[0]);
        assert_eq!(sharpness(&out.frames()[11]), reference);
        assert_eq!(sharpness(&out.frames()[12]), reference);
        assert!(sharpness(&out.frames()[23]) < sharpness(&out.frames()[14]));
        // Most blurred at the cut, sharp again after the ramp
        assert!(sharpness(&out.frames()[24]) < sharpness(&out.frames()[30]));
        assert_eq!(sharpness(&out.frames()[36]), reference);
    }

    #[test]
    fn test_blur_rejects_out_of_range_strength() {
        let clip = solid_clip([0, 0, 0], 1.0);
        let params = BlurParams {
            duration: 0.5,
            max_blur: 2.0,
        };
        assert!(blur(&clip, &clip, &params).is_err());
    }
}
