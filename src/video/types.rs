use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ParameterError, Result};
use crate::video::audio::AudioTrack;

/// Tolerance used when converting a timestamp into a frame index, so that
/// `k / fps * fps` lands on `k` instead of `k - 1`.
const INDEX_EPSILON: f64 = 1e-6;

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer (3 channels, 8 bit,
/// no alpha). Transitions never mutate a frame that belongs to a clip: they
/// read from it and produce a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    /// Build a frame by evaluating `f` at every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgb(f(x, y)));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Row-major interleaved RGB samples
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Mutable row-major interleaved RGB samples
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut *self.buffer
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Consume the frame, returning the image buffer
    pub fn into_image(self) -> RgbImage {
        self.buffer
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Resize to the given dimensions with a Lanczos3 filter
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.size() == (width, height) {
            return self.clone();
        }
        Frame::new(image::imageops::resize(
            &self.buffer,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save_with_format(path, image::ImageFormat::Png)
    }
}

/// An opaque RGB color, written as `#rrggbb`, `#rgb` or a CSS-style name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);
    pub const WHITE: Color = Color([255, 255, 255]);

    pub fn rgb(self) -> [u8; 3] {
        self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for Color {
    type Err = ParameterError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let unknown = || ParameterError::UnknownColor {
            value: value.to_string(),
        };
        let trimmed = value.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()
                .ok_or_else(unknown)?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Color([r * 17, g * 17, b * 17])),
                [r1, r0, g1, g0, b1, b0] => {
                    Ok(Color([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0]))
                }
                _ => Err(unknown()),
            };
        }

        let rgb = match trimmed.to_ascii_lowercase().as_str() {
            "black" => [0, 0, 0],
            "white" => [255, 255, 255],
            "red" => [255, 0, 0],
            "green" => [0, 128, 0],
            "lime" => [0, 255, 0],
            "blue" => [0, 0, 255],
            "yellow" => [255, 255, 0],
            "cyan" => [0, 255, 255],
            "magenta" => [255, 0, 255],
            "orange" => [255, 165, 0],
            "gray" | "grey" => [128, 128, 128],
            _ => return Err(unknown()),
        };
        Ok(Color(rgb))
    }
}

impl TryFrom<String> for Color {
    type Error = ParameterError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// A decoded, finite sequence of frames with a known frame rate.
///
/// Frames are reference counted and immutable once inside a clip, so a
/// transition can pass untouched frames from its inputs straight through to
/// its output without copying pixel data. `frame_count == round(duration * fps)`
/// holds by construction since the duration is derived from the frame count.
#[derive(Debug, Clone)]
pub struct Clip {
    frames: Vec<Arc<Frame>>,
    fps: f64,
    size: (u32, u32),
    audio: AudioTrack,
}

impl Clip {
    /// Create a clip from owned frames
    pub fn new(frames: Vec<Frame>, fps: f64) -> Result<Self> {
        Self::from_shared(frames.into_iter().map(Arc::new).collect(), fps)
    }

    /// Create a clip from shared frames, checking that every frame has the same size
    pub fn from_shared(frames: Vec<Arc<Frame>>, fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ParameterError::OutOfRange {
                name: "fps".to_string(),
                value: fps.to_string(),
                expected: "> 0".to_string(),
            }
            .into());
        }

        let first = frames.first().ok_or(ParameterError::NotEnoughFrames {
            required: 1,
            found: 0,
        })?;
        let size = first.size();

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.size() != size)
        {
            return Err(ParameterError::InconsistentFrames {
                index,
                expected: size,
                found: frame.size(),
            }
            .into());
        }

        let duration = frames.len() as f64 / fps;
        Ok(Self {
            frames,
            fps,
            size,
            audio: AudioTrack::silence(duration),
        })
    }

    /// A constant-color clip. All frames share one buffer.
    pub fn solid(width: u32, height: u32, color: [u8; 3], fps: f64, duration: f64) -> Result<Self> {
        let count = (duration * fps).round();
        if !count.is_finite() || count < 1.0 {
            return Err(ParameterError::OutOfRange {
                name: "duration".to_string(),
                value: duration.to_string(),
                expected: "at least one frame interval".to_string(),
            }
            .into());
        }
        let frame = Arc::new(Frame::new_filled(width, height, color));
        Self::from_shared(vec![frame; count as usize], fps)
    }

    /// Attach an audio track
    pub fn with_audio(mut self, audio: AudioTrack) -> Self {
        self.audio = audio;
        self
    }

    pub fn audio(&self) -> &AudioTrack {
        &self.audio
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Seconds between two consecutive frames
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    /// `(width, height)` shared by every frame
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Arc<Frame>> {
        self.frames.get(index)
    }

    pub fn first_frame(&self) -> &Arc<Frame> {
        &self.frames[0]
    }

    pub fn last_frame(&self) -> &Arc<Frame> {
        &self.frames[self.frames.len() - 1]
    }

    /// Index of the frame displayed at time `t`, clamped to the clip
    pub fn index_at(&self, t: f64) -> usize {
        if !t.is_finite() || t <= 0.0 {
            return 0;
        }
        let index = (t * self.fps + INDEX_EPSILON).floor() as usize;
        index.min(self.frames.len() - 1)
    }

    /// The frame displayed at time `t` (seconds), clamped to the clip
    pub fn frame_at(&self, t: f64) -> &Arc<Frame> {
        &self.frames[self.index_at(t)]
    }

    /// Frames `[start, end)` as a new clip at the same frame rate
    pub fn slice(&self, start: usize, end: usize) -> Result<Clip> {
        let end = end.min(self.frames.len());
        if start >= end {
            return Err(ParameterError::NotEnoughFrames {
                required: 1,
                found: end.saturating_sub(start),
            }
            .into());
        }
        let audio = self
            .audio
            .section(start as f64 / self.fps, (end - start) as f64 / self.fps);
        Ok(Self::from_shared(self.frames[start..end].to_vec(), self.fps)?.with_audio(audio))
    }

    /// Re-time the clip to another frame rate by sampling at each new frame time
    pub fn resampled(&self, fps: f64) -> Result<Clip> {
        if (fps - self.fps).abs() < f64::EPSILON {
            return Ok(self.clone());
        }
        let count = ((self.duration() * fps).round() as usize).max(1);
        let frames = (0..count)
            .map(|i| Arc::clone(self.frame_at(i as f64 / fps)))
            .collect();
        Ok(Self::from_shared(frames, fps)?.with_audio(self.audio.clone()))
    }

    /// Resize every frame to `(width, height)`
    pub fn resized(&self, width: u32, height: u32) -> Result<Clip> {
        if self.size == (width, height) {
            return Ok(self.clone());
        }
        let frames = self
            .frames
            .iter()
            .map(|frame| Arc::new(frame.resized(width, height)))
            .collect();
        Ok(Self::from_shared(frames, self.fps)?.with_audio(self.audio.clone()))
    }
}
