use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::{DistortionType, ZoomParams, ZoomWarpParams};
use crate::transitions::window::{Overlap, WindowFrame};
use crate::video::types::{Clip, Frame};

/// Spacing between motion blur samples, in seconds
const MOTION_BLUR_STEP: f64 = 0.01;

/// Keeps the forward-looking blur samples strictly inside the incoming clip
const END_MARGIN: f64 = 0.001;

/// Radial warp applied after the zoom, per side
#[derive(Debug, Clone, Copy)]
struct Warp {
    factor: f64,
    outgoing: DistortionType,
    incoming: DistortionType,
}

/// `clip1` zooms in and fades out while `clip2` zooms out from the same
/// magnification and fades in.
pub fn zoom(clip1: &Clip, clip2: &Clip, params: &ZoomParams) -> Result<Clip> {
    zoom_with_warp(clip1, clip2, params, None)
}

/// [`zoom`] with a radial bulge or pinch that grows with the zoom
pub fn zoom_warp(clip1: &Clip, clip2: &Clip, params: &ZoomWarpParams) -> Result<Clip> {
    params.validate()?;
    let warp = Warp {
        factor: params.distortion_factor,
        outgoing: params.distortion_types[0],
        incoming: params.distortion_types[1],
    };
    zoom_with_warp(clip1, clip2, &params.zoom(), Some(warp))
}

fn zoom_with_warp(clip1: &Clip, clip2: &Clip, params: &ZoomParams, warp: Option<Warp>) -> Result<Clip> {
    let overlap = Overlap::new(clip1, clip2, params.duration)?;
    let ease = params.speed_curve.function();
    let blur_samples = params.motion_blur as usize;
    debug!(
        "Zoom over {} frames, motion blur {}, warp {:?}",
        overlap.frames, blur_samples, warp
    );

    overlap.compose(|window| {
        let eased_in = ease(window.progress);
        let eased_out = ease(1.0 - window.progress);

        let outgoing = ops::motion_blur(
            window.outgoing,
            &trailing_samples(&overlap.clip1, window, blur_samples),
        );
        let mut outgoing = ops::zoom_crop(&outgoing, 1.0 + eased_in);

        let incoming = ops::motion_blur(
            window.incoming,
            &leading_samples(&overlap.clip2, window, blur_samples),
        );
        let mut incoming = ops::zoom_crop(&incoming, 1.0 + eased_out);

        if let Some(warp) = warp.filter(|w| w.factor > 0.0) {
            outgoing = ops::radial_distort(&outgoing, warp.factor * eased_in, warp.outgoing);
            incoming = ops::radial_distort(&incoming, warp.factor * eased_out, warp.incoming);
        }

        Ok(ops::blend(&outgoing, &incoming, 1.0 - window.progress))
    })
}

/// Frames shortly before the outgoing frame, nearest first
fn trailing_samples(clip: &Clip, window: &WindowFrame<'_>, count: usize) -> Vec<Arc<Frame>> {
    (1..=count)
        .map(|i| {
            let t = (window.outgoing_time - i as f64 * MOTION_BLUR_STEP).max(0.0);
            Arc::clone(clip.frame_at(t))
        })
        .collect()
}

/// Frames shortly after the incoming frame, nearest first
fn leading_samples(clip: &Clip, window: &WindowFrame<'_>, count: usize) -> Vec<Arc<Frame>> {
    let last = clip.duration() - END_MARGIN;
    (1..=count)
        .map(|i| {
            let t = (window.incoming_time + i as f64 * MOTION_BLUR_STEP).min(last);
            Arc::clone(clip.frame_at(t))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::curves::SpeedCurve;
    use crate::testing::{numbered_clip, solid_clip};

    #[test]
    fn test_zoom_duration_and_endpoints() {
        let red = solid_clip([255, 0, 0], 2.0);
        let blue = solid_clip([0, 0, 255], 2.0);
        let params = ZoomParams {
            duration: 0.5,
            motion_blur: 3,
            speed_curve: SpeedCurve::Linear,
        };
        let out = zoom(&red, &blue, &params).unwrap();

        assert_eq!(out.frame_count(), 84);
        assert_eq!(out.first_frame().get_pixel(5, 5), [255, 0, 0]);
        assert_eq!(out.last_frame().get_pixel(5, 5), [0, 0, 255]);
        // Solid clips stay solid under zoom, so the window is a plain fade
        let mid = out.frames()[36 + 6].get_pixel(5, 5);
        assert!(mid[0] > 0 && mid[0] < 255);
        assert!(mid[2] > 0 && mid[2] < 255);
    }

    #[test]
    fn test_motion_blur_mixes_neighbouring_frames() {
        let clip1 = numbered_clip(24, 24.0);
        let clip2 = numbered_clip(24, 24.0);
        let sharp = ZoomParams {
            duration: 0.5,
            motion_blur: 0,
            speed_curve: SpeedCurve::Linear,
        };
        let blurred = ZoomParams {
            motion_blur: 10,
            ..sharp.clone()
        };

        let a = zoom(&clip1, &clip2, &sharp).unwrap();
        let b = zoom(&clip1, &clip2, &blurred).unwrap();
        assert_eq!(a.frame_count(), b.frame_count());
        // Blur pulls the outgoing frame toward its predecessors
        assert_ne!(a.frames()[14].get_pixel(0, 0), b.frames()[14].get_pixel(0, 0));
        // Outside the window nothing changes
        assert_eq!(a.frames()[3], b.frames()[3]);
    }

    #[test]
    fn test_zoom_warp_validates_factor() {
        let red = solid_clip([255, 0, 0], 1.0);
        let blue = solid_clip([0, 0, 255], 1.0);
        let mut params = ZoomWarpParams::default();
        params.distortion_factor = 1.2;
        assert!(zoom_warp(&red, &blue, &params).is_err());
    }

    #[test]
    fn test_zoom_warp_keeps_size_and_endpoints() {
        let red = solid_clip([255, 0, 0], 1.0);
        let blue = solid_clip([0, 0, 255], 1.0);
        let params = ZoomWarpParams {
            duration: 0.5,
            motion_blur: 2,
            speed_curve: SpeedCurve::Sigmoid,
            distortion_factor: 1.0,
            distortion_types: [DistortionType::Bulge, DistortionType::Pinch],
        };
        let out = zoom_warp(&red, &blue, &params).unwrap();
        assert_eq!(out.frame_count(), 36);
        assert!(out.frames().iter().all(|f| f.size() == (64, 36)));
        assert_eq!(out.first_frame().get_pixel(0, 0), [255, 0, 0]);
        assert_eq!(out.last_frame().get_pixel(0, 0), [0, 0, 255]);
    }
}
