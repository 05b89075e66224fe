//! Pure pixel kernels shared by the transitions.
//!
//! Every function reads its input frames and returns a new [`Frame`]; none of
//! them mutate a frame that may still belong to a clip.

use std::sync::Arc;

use image::imageops::{self, FilterType};

use crate::transitions::params::{DistortionType, WipeDirection};
use crate::video::types::{Color, Frame};

/// Smallest crop edge the zoom kernel will resize up from
const MIN_CROP_EDGE: u32 = 20;

/// Kernel radius in multiples of sigma
const BLUR_RADIUS_SIGMAS: f64 = 3.0;

/// Q16 fixed point unit used by the blur kernel
const Q16_ONE: u32 = 1 << 16;

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// `weight_a * a + (1 - weight_a) * b` per channel
pub fn blend(a: &Frame, b: &Frame, weight_a: f64) -> Frame {
    let weight = weight_a.clamp(0.0, 1.0);
    let mut out = Frame::new_black(a.width(), a.height());
    for ((o, &pa), &pb) in out.as_raw_mut().iter_mut().zip(a.as_raw()).zip(b.as_raw()) {
        *o = to_u8(weight * pa as f64 + (1.0 - weight) * pb as f64);
    }
    out
}

/// Fade `frame` toward a solid color. `visibility` 1.0 keeps the frame, 0.0 is pure color.
pub fn fade_to_color(frame: &Frame, color: Color, visibility: f64) -> Frame {
    let visibility = visibility.clamp(0.0, 1.0);
    let rgb = color.rgb();
    let mut out = Frame::new_black(frame.width(), frame.height());
    for (i, (o, &p)) in out.as_raw_mut().iter_mut().zip(frame.as_raw()).enumerate() {
        *o = to_u8(visibility * p as f64 + (1.0 - visibility) * rgb[i % 3] as f64);
    }
    out
}

/// Separable Gaussian blur with clamp-to-edge sampling. `sigma <= 0` is the identity.
pub fn gaussian_blur(frame: &Frame, sigma: f64) -> Frame {
    if !sigma.is_finite() || sigma <= 0.0 {
        return frame.clone();
    }
    let radius = (sigma * BLUR_RADIUS_SIGMAS).ceil() as usize;
    let kernel = gaussian_kernel_q16(radius, sigma);

    let (width, height) = frame.size();
    let mut tmp = vec![0u8; frame.as_raw().len()];
    horizontal_pass(frame.as_raw(), &mut tmp, width as usize, height as usize, &kernel);

    let mut out = Frame::new_black(width, height);
    vertical_pass(&tmp, out.as_raw_mut(), width as usize, height as usize, &kernel);
    out
}

/// Normalised kernel whose weights sum to exactly one in Q16
fn gaussian_kernel_q16(radius: usize, sigma: f64) -> Vec<u32> {
    let r = radius as i64;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-r..=r)
        .map(|i| (-(i * i) as f64 / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut kernel: Vec<u32> = weights
        .iter()
        .map(|w| ((w / sum) * Q16_ONE as f64).round() as u32)
        .collect();

    // Push the rounding error into the center tap
    let total: i64 = kernel.iter().map(|&k| k as i64).sum();
    let center = kernel.len() / 2;
    kernel[center] = (kernel[center] as i64 + Q16_ONE as i64 - total).max(0) as u32;
    kernel
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + (Q16_ONE as u64 / 2)) >> 16).min(255) as u8
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, kernel: &[u32]) {
    let radius = (kernel.len() / 2) as isize;
    let last = width as isize - 1;
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = [0u64; 3];
            for (ki, &k) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius).clamp(0, last) as usize;
                let idx = (row + sx) * 3;
                for c in 0..3 {
                    acc[c] += k as u64 * src[idx + c] as u64;
                }
            }
            let out = (row + x) * 3;
            for c in 0..3 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, kernel: &[u32]) {
    let radius = (kernel.len() / 2) as isize;
    let last = height as isize - 1;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0u64; 3];
            for (ki, &k) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius).clamp(0, last) as usize;
                let idx = (sy * width + x) * 3;
                for c in 0..3 {
                    acc[c] += k as u64 * src[idx + c] as u64;
                }
            }
            let out = (y * width + x) * 3;
            for c in 0..3 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

/// Crop the centered `1 / factor` region and scale it back to full size.
///
/// The crop never shrinks below 20 pixels per edge. A factor of 1 returns the
/// frame unchanged.
pub fn zoom_crop(frame: &Frame, factor: f64) -> Frame {
    let (width, height) = frame.size();
    if !factor.is_finite() || factor <= 1.0 + 1e-9 {
        return frame.clone();
    }

    let crop_w = ((width as f64 / factor) as u32).max(MIN_CROP_EDGE).min(width);
    let crop_h = ((height as f64 / factor) as u32).max(MIN_CROP_EDGE).min(height);
    if (crop_w, crop_h) == (width, height) {
        return frame.clone();
    }

    let x = width / 2 - crop_w / 2;
    let y = height / 2 - crop_h / 2;
    let cropped = imageops::crop_imm(frame.as_image(), x, y, crop_w, crop_h).to_image();
    Frame::new(imageops::resize(&cropped, width, height, FilterType::Triangle))
}

/// Bilinear sample with coordinates clamped into the frame
fn sample_clamped(frame: &Frame, x: f64, y: f64) -> [u8; 3] {
    let max_x = (frame.width() - 1) as f64;
    let max_y = (frame.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x1 = (x0 + 1.0).min(max_x) as u32;
    let y1 = (y0 + 1.0).min(max_y) as u32;
    let (x0, y0) = (x0 as u32, y0 as u32);

    let p00 = frame.get_pixel(x0, y0);
    let p10 = frame.get_pixel(x1, y0);
    let p01 = frame.get_pixel(x0, y1);
    let p11 = frame.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = to_u8(top * (1.0 - fy) + bottom * fy);
    }
    out
}

/// Bilinear sample where everything outside the frame is black
fn sample_black_border(frame: &Frame, x: f64, y: f64) -> [u8; 3] {
    let (width, height) = (frame.width() as i64, frame.height() as i64);
    if !x.is_finite() || !y.is_finite() || x <= -1.0 || y <= -1.0 || x >= width as f64 || y >= height as f64 {
        return [0, 0, 0];
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |px: i64, py: i64| -> [f64; 3] {
        if px < 0 || py < 0 || px >= width || py >= height {
            [0.0; 3]
        } else {
            let p = frame.get_pixel(px as u32, py as u32);
            [p[0] as f64, p[1] as f64, p[2] as f64]
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = to_u8(top * (1.0 - fy) + bottom * fy);
    }
    out
}

/// Radial coordinate remap around the frame center.
///
/// Each output pixel at normalised radius `r` samples the input at `r * d`,
/// where `d` is `1 + strength * r^2` for a bulge and
/// `max(0.1, 1 - strength * r^2)` for a pinch.
pub fn radial_distort(frame: &Frame, strength: f64, kind: DistortionType) -> Frame {
    if strength == 0.0 {
        return frame.clone();
    }
    let (width, height) = frame.size();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let max_r_sq = cx * cx + cy * cy;

    Frame::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let r_sq = (dx * dx + dy * dy) / max_r_sq;
        let displacement = match kind {
            DistortionType::Bulge => 1.0 + strength * r_sq,
            DistortionType::Pinch => (1.0 - strength * r_sq).max(0.1),
        };
        sample_clamped(frame, dx * displacement + cx, dy * displacement + cy)
    })
}

/// A 3x3 projective transform with its last entry fixed at 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography([f64; 9]);

impl Homography {
    pub fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// The transform taking each `from[i]` onto `to[i]`, or `None` when the
    /// quadrilaterals are degenerate.
    pub fn from_points(from: &[(f64, f64); 4], to: &[(f64, f64); 4]) -> Option<Self> {
        // Eight equations in h0..h7, solved by Gaussian elimination with partial pivoting
        let mut system = [[0.0f64; 9]; 8];
        for (i, (&(x, y), &(u, v))) in from.iter().zip(to.iter()).enumerate() {
            system[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            system[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }

        for col in 0..8 {
            let pivot = (col..8).max_by(|&a, &b| {
                system[a][col]
                    .abs()
                    .partial_cmp(&system[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            if system[pivot][col].abs() < 1e-12 {
                return None;
            }
            system.swap(col, pivot);

            for row in 0..8 {
                if row == col {
                    continue;
                }
                let factor = system[row][col] / system[col][col];
                if factor != 0.0 {
                    for k in col..9 {
                        system[row][k] -= factor * system[col][k];
                    }
                }
            }
        }

        let mut h = [0.0f64; 9];
        for (i, row) in system.iter().enumerate() {
            h[i] = row[8] / row[i];
        }
        h[8] = 1.0;
        Some(Self(h))
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let h = &self.0;
        let w = h[6] * x + h[7] * y + h[8];
        (
            (h[0] * x + h[1] * y + h[2]) / w,
            (h[3] * x + h[4] * y + h[5]) / w,
        )
    }
}

/// Warp `frame` so that the frame corners land on `corners`
/// (top-left, top-right, bottom-right, bottom-left). Uncovered pixels are black.
pub fn warp_perspective(frame: &Frame, corners: &[(f64, f64); 4]) -> Frame {
    let (width, height) = frame.size();
    let (w, h) = (width as f64, height as f64);
    let frame_corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    if *corners == frame_corners {
        return frame.clone();
    }

    // Each output pixel looks up where it came from
    match Homography::from_points(corners, &frame_corners) {
        Some(inverse) => Frame::from_fn(width, height, |x, y| {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            sample_black_border(frame, sx, sy)
        }),
        None => Frame::new_black(width, height),
    }
}

/// Accumulate earlier samples into `base`.
///
/// Sample `i` (1-based) is mixed in with weight `(k + 1 - i) / (10k)` where `k`
/// is the number of samples, each mix applied on top of the previous one.
pub fn motion_blur(base: &Frame, samples: &[Arc<Frame>]) -> Frame {
    if samples.is_empty() {
        return base.clone();
    }
    let k = samples.len() as f64;
    let mut acc: Vec<f64> = base.as_raw().iter().map(|&v| v as f64).collect();

    for (i, sample) in samples.iter().enumerate() {
        let weight = (k - i as f64) / (10.0 * k);
        for (a, &s) in acc.iter_mut().zip(sample.as_raw()) {
            *a = *a * (1.0 - weight) + s as f64 * weight;
        }
    }

    let mut out = Frame::new_black(base.width(), base.height());
    for (o, a) in out.as_raw_mut().iter_mut().zip(acc) {
        *o = to_u8(a);
    }
    out
}

/// Horizontal slide: `outgoing` shifted left by `position * width`, `incoming`
/// entering from the right edge, both on a black canvas.
pub fn slide_composite(outgoing: &Frame, incoming: &Frame, position: f64) -> Frame {
    let (width, height) = outgoing.size();
    let w = width as usize;
    let position = position.clamp(0.0, 1.0);

    let offset = ((position * w as f64) as usize).min(w);
    let incoming_visible = w - (((1.0 - position) * w as f64) as usize).min(w);

    let mut canvas = Frame::new_black(width, height);
    let out = canvas.as_raw_mut();
    let src1 = outgoing.as_raw();
    let src2 = incoming.as_raw();

    for y in 0..height as usize {
        let row = y * w * 3;
        let visible = w - offset;
        if visible > 0 {
            out[row..row + visible * 3]
                .copy_from_slice(&src1[row + offset * 3..row + w * 3]);
        }
        if incoming_visible > 0 {
            let start = w - incoming_visible;
            out[row + start * 3..row + w * 3]
                .copy_from_slice(&src2[row..row + incoming_visible * 3]);
        }
    }
    canvas
}

/// Index of the wipe edge for `progress`, along the wipe axis
fn wipe_edge(direction: WipeDirection, extent: u32, progress: f64) -> u32 {
    let extent_f = extent as f64;
    let edge = match direction {
        WipeDirection::LeftToRight | WipeDirection::TopToBottom => extent_f * progress,
        WipeDirection::RightToLeft | WipeDirection::BottomToTop => extent_f * (1.0 - progress),
    };
    (edge.max(0.0) as u32).min(extent)
}

/// True where the incoming clip shows through at `progress`
pub fn wipe_reveals(direction: WipeDirection, width: u32, height: u32, progress: f64, x: u32, y: u32) -> bool {
    match direction {
        WipeDirection::LeftToRight => x < wipe_edge(direction, width, progress),
        WipeDirection::RightToLeft => x >= wipe_edge(direction, width, progress),
        WipeDirection::TopToBottom => y < wipe_edge(direction, height, progress),
        WipeDirection::BottomToTop => y >= wipe_edge(direction, height, progress),
    }
}

/// `incoming` where the wipe has revealed it, `outgoing` elsewhere
pub fn wipe_composite(outgoing: &Frame, incoming: &Frame, direction: WipeDirection, progress: f64) -> Frame {
    let (width, height) = outgoing.size();
    Frame::from_fn(width, height, |x, y| {
        if wipe_reveals(direction, width, height, progress, x, y) {
            incoming.get_pixel(x, y)
        } else {
            outgoing.get_pixel(x, y)
        }
    })
}
