use tracing::debug;

use crate::error::Result;
use crate::transitions::ops;
use crate::transitions::params::{SlideParams, SlideWarpParams};
use crate::transitions::window::Overlap;
use crate::video::types::{Clip, Frame};

/// Peak of the blur schedule, in pixels of sigma
const PEAK_BLUR: f64 = 10.0;

/// Below this sigma frames are composited sharp
const MIN_VISIBLE_BLUR: f64 = 0.5;

/// Steepness of the rising and falling edges of the blur schedule
const BLUR_EDGE_STEEPNESS: f64 = 15.0;

/// Blur sigma at `progress` through a slide. Rises around 0.25, holds near
/// [`PEAK_BLUR`] through the middle and falls around 0.75.
pub fn blur_schedule(progress: f64) -> f64 {
    if progress < 0.5 {
        PEAK_BLUR / (1.0 + (-BLUR_EDGE_STEEPNESS * (progress - 0.25)).exp())
    } else {
        PEAK_BLUR / (1.0 + (BLUR_EDGE_STEEPNESS * (progress - 0.75)).exp())
    }
}

/// `clip1` moves off to the left while `clip2` enters from the right edge
pub fn slide(clip1: &Clip, clip2: &Clip, params: &SlideParams) -> Result<Clip> {
    slide_with_stretch(clip1, clip2, params, 0.0)
}

/// [`slide`] with both frames squeezed toward the seam in proportion to the blur
pub fn slide_warp(clip1: &Clip, clip2: &Clip, params: &SlideWarpParams) -> Result<Clip> {
    params.validate()?;
    slide_with_stretch(clip1, clip2, &params.slide(), params.stretch_intensity)
}

fn slide_with_stretch(clip1: &Clip, clip2: &Clip, params: &SlideParams, stretch: f64) -> Result<Clip> {
    let overlap = Overlap::new(clip1, clip2, params.duration)?;
    let ease = params.speed_curve.function();
    debug!(
        "Slide over {} frames, curve {}, stretch {:.2}",
        overlap.frames, params.speed_curve, stretch
    );

    overlap.compose(|window| {
        let position = ease(window.progress);
        let sigma = blur_schedule(window.progress);

        let (mut outgoing, mut incoming): (Frame, Frame) = if stretch > 0.0 {
            let (width, height) = window.outgoing.size();
            let (w, h) = (width as f64, height as f64);
            let squeeze = w * sigma / PEAK_BLUR * stretch;
            (
                ops::warp_perspective(window.outgoing, &[(0.0, 0.0), (w - squeeze, 0.0), (w - squeeze, h), (0.0, h)]),
                ops::warp_perspective(window.incoming, &[(squeeze, 0.0), (w, 0.0), (w, h), (squeeze, h)]),
            )
        } else {
            ((**window.outgoing).clone(), (**window.incoming).clone())
        };

        if sigma > MIN_VISIBLE_BLUR {
            outgoing = ops::gaussian_blur(&outgoing, sigma);
            incoming = ops::gaussian_blur(&incoming, sigma);
        }

        Ok(ops::slide_composite(&outgoing, &incoming, position))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::curves::SpeedCurve;
    use crate::testing::solid_clip;

    #[test]
    fn test_blur_schedule_shape() {
        assert!(blur_schedule(0.0) < MIN_VISIBLE_BLUR);
        assert!(blur_schedule(0.5) > 9.0);
        assert!(blur_schedule(0.99) < MIN_VISIBLE_BLUR);
        assert!(blur_schedule(0.25) < blur_schedule(0.4));
        assert!((blur_schedule(0.25) - 5.0).abs() < 1e-9);
        assert!((blur_schedule(0.75) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_slide_duration_and_endpoints() {
        let red = solid_clip([255, 0, 0], 2.0);
        let blue = solid_clip([0, 0, 255], 2.0);
        let out = slide(&red, &blue, &SlideParams::default()).unwrap();

        assert_eq!(out.frame_count(), 72);
        assert_eq!(out.first_frame().get_pixel(0, 0), [255, 0, 0]);
        assert_eq!(out.last_frame().get_pixel(63, 35), [0, 0, 255]);
    }

    #[test]
    fn test_slide_moves_incoming_in_from_the_right() {
        let red = solid_clip([255, 0, 0], 1.0);
        let blue = solid_clip([0, 0, 255], 1.0);
        let params = SlideParams {
            duration: 1.0,
            speed_curve: SpeedCurve::Linear,
        };
        let out = slide(&red, &blue, &params).unwrap();
        assert_eq!(out.frame_count(), 24);

        // Last window frame, after the blur has died down
        let frame = &out.frames()[23];
        assert_eq!(frame.get_pixel(0, 18), [255, 0, 0]);
        assert_eq!(frame.get_pixel(63, 18), [0, 0, 255]);
    }

    #[test]
    fn test_slide_warp_validates_and_keeps_size() {
        let red = solid_clip([255, 0, 0], 1.0);
        let blue = solid_clip([0, 0, 255], 1.0);
        let mut params = SlideWarpParams {
            duration: 0.5,
            ..SlideWarpParams::default()
        };
        let out = slide_warp(&red, &blue, &params).unwrap();
        assert_eq!(out.frame_count(), 36);
        assert!(out.frames().iter().all(|f| f.size() == (64, 36)));

        params.stretch_intensity = -0.1;
        assert!(slide_warp(&red, &blue, &params).is_err());
    }
}
