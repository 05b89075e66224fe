use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::CrossfadeParams;
use crate::transitions::window::Overlap;
use crate::video::types::Clip;

/// Weighted blend from `clip1` into `clip2` over the last `duration` seconds of `clip1`.
///
/// Inside the window the outgoing weight is `1 - curve(progress)`.
pub fn crossfade(clip1: &Clip, clip2: &Clip, params: &CrossfadeParams) -> Result<Clip> {
    let overlap = Overlap::new(clip1, clip2, params.duration)?;
    let ease = params.speed_curve.function();
    debug!(
        "Crossfade over {} frames with {} curve",
        overlap.frames, params.speed_curve
    );

    overlap.compose(|window| {
        let weight = 1.0 - ease(window.progress);
        Ok(ops::blend(window.outgoing, window.incoming, weight))
    })
}
