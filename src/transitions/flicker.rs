use std::sync::Arc;

use tracing::debug;

use crate::error::{ParameterError, Result};
use crate::transitions::ops;
use crate::transitions::window::{check_same_size, sequence};
use crate::video::types::Clip;

const FLICKER_ZOOM: f64 = 5.0;
const FIRST_FLASH_SIGMA: f64 = 10.0;
const SECOND_FLASH_SIGMA: f64 = 2.5;

/// Replace the last two frames of `clip1` with heavily zoomed, blurred copies
/// of themselves, then cut to `clip2`.
pub fn flicker(clip1: &Clip, clip2: &Clip) -> Result<Clip> {
    check_same_size(clip1, clip2)?;
    let count = clip1.frame_count();
    if count < 2 {
        return Err(ParameterError::NotEnoughFrames {
            required: 2,
            found: count,
        }
        .into());
    }
    debug!("Flicker on the last two of {} frames", count);

    let mut head: Vec<_> = clip1.frames()[..count - 2].to_vec();
    for (frame, sigma) in clip1.frames()[count - 2..]
        .iter()
        .zip([FIRST_FLASH_SIGMA, SECOND_FLASH_SIGMA])
    {
        let zoomed = ops::zoom_crop(frame, FLICKER_ZOOM);
        head.push(Arc::new(ops::gaussian_blur(&zoomed, sigma)));
    }

    let clip2 = clip2.resampled(clip1.fps())?;
    sequence(clip1.fps(), head, clip2.frames().to_vec(), clip1.audio(), clip2.audio())
}
