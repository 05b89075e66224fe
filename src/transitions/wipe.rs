use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::WipeParams;
use crate::transitions::window::Overlap;
use crate::video::types::Clip;

/// Hard-edged reveal of `clip2` underneath `clip1`.
///
/// The revealed region grows along the chosen direction in proportion to
/// linear (uneased) progress.
pub fn wipe(clip1: &Clip, clip2: &Clip, params: &WipeParams) -> Result<Clip> {
    let overlap = Overlap::new(clip1, clip2, params.duration)?;
    debug!("Wipe {} over {} frames", params.direction, overlap.frames);

    overlap.compose(|window| {
        Ok(ops::wipe_composite(
            window.outgoing,
            window.incoming,
            params.direction,
            window.progress,
        ))
    })
}
