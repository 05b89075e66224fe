//! # Overlay Compositor
//!
//! Draws text and logo overlays onto a window of a clip's frames, with an
//! optional linear fade at each edge of the window. Frames outside the window
//! are shared with the input clip untouched. Overlays in a list are applied in
//! order, each one drawn over the output of the previous.
//!
//! Requests arrive as JSON:
//!
//! ```json
//! {
//!   "video_path": "ad.mp4",
//!   "overlays": [
//!     { "text": "Summer Sale", "fontsize": 64, "position": "bottom",
//!       "start_time": 1.0, "duration": 3.0, "fade_duration": 0.5,
//!       "stroke_color": "black", "stroke_width": 2 },
//!     { "logo_path": "logo.png", "width": 120, "height": 60, "x": 16, "y": 16,
//!       "start_time": 0.0, "duration": 2.0 }
//!   ]
//! }
//! ```

pub mod logo;
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::OverlayConfig;
use crate::error::{CompositorError, ConfigError, ParameterError, Result};
use crate::video::source::FrameSource;
use crate::video::types::{Clip, Color, Frame};
use crate::video::writer::WrittenClip;

pub use logo::{load_logo, LogoSpec};
pub use text::{TextRenderer, TextStyle};

/// Slack when comparing an overlay window against the clip duration
const WINDOW_TOLERANCE: f64 = 1e-6;

/// Named placement of an overlay inside the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    pub fn name(self) -> &'static str {
        match self {
            Anchor::Center => "center",
            Anchor::Top => "top",
            Anchor::Bottom => "bottom",
            Anchor::Left => "left",
            Anchor::Right => "right",
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl FromStr for Anchor {
    type Err = ParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "center" | "centre" => Ok(Anchor::Center),
            "top" => Ok(Anchor::Top),
            "bottom" => Ok(Anchor::Bottom),
            "left" => Ok(Anchor::Left),
            "right" => Ok(Anchor::Right),
            "top-left" => Ok(Anchor::TopLeft),
            "top-right" => Ok(Anchor::TopRight),
            "bottom-left" => Ok(Anchor::BottomLeft),
            "bottom-right" => Ok(Anchor::BottomRight),
            _ => Err(ParameterError::UnknownPosition { name: s.to_string() }),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the top-left corner of an overlay lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    Anchor(Anchor),
    /// Absolute pixel offset of the overlay's top-left corner
    At { x: i64, y: i64 },
}

impl OverlayPosition {
    /// Top-left corner for a `layer`-sized overlay on a `frame`-sized frame
    pub fn place(self, frame: (u32, u32), layer: (u32, u32)) -> (i64, i64) {
        let free_x = frame.0 as i64 - layer.0 as i64;
        let free_y = frame.1 as i64 - layer.1 as i64;
        let (center_x, center_y) = (free_x / 2, free_y / 2);
        match self {
            OverlayPosition::At { x, y } => (x, y),
            OverlayPosition::Anchor(anchor) => match anchor {
                Anchor::Center => (center_x, center_y),
                Anchor::Top => (center_x, 0),
                Anchor::Bottom => (center_x, free_y),
                Anchor::Left => (0, center_y),
                Anchor::Right => (free_x, center_y),
                Anchor::TopLeft => (0, 0),
                Anchor::TopRight => (free_x, 0),
                Anchor::BottomLeft => (0, free_y),
                Anchor::BottomRight => (free_x, free_y),
            },
        }
    }
}

/// What an overlay draws
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
    Text(TextStyle),
    Logo(LogoSpec),
}

/// One overlay: content, placement and the time window it is visible in
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawOverlay")]
pub struct OverlaySpec {
    pub content: OverlayContent,
    pub position: OverlayPosition,
    /// Seconds from the start of the clip
    pub start_time: f64,
    /// Visible duration; runs to the end of the clip when `None`
    pub duration: Option<f64>,
    /// Length of the fade-in and of the fade-out, zero for a hard cut
    pub fade_duration: f64,
}

impl OverlaySpec {
    /// Centered text over the whole clip
    pub fn text(style: TextStyle) -> Self {
        Self {
            content: OverlayContent::Text(style),
            position: OverlayPosition::Anchor(Anchor::Center),
            start_time: 0.0,
            duration: None,
            fade_duration: 0.0,
        }
    }

    /// A logo in the top-left corner over the whole clip
    pub fn logo(spec: LogoSpec) -> Self {
        Self {
            content: OverlayContent::Logo(spec),
            position: OverlayPosition::At { x: 0, y: 0 },
            start_time: 0.0,
            duration: None,
            fade_duration: 0.0,
        }
    }

    pub fn positioned(mut self, position: OverlayPosition) -> Self {
        self.position = position;
        self
    }

    pub fn between(mut self, start_time: f64, duration: f64) -> Self {
        self.start_time = start_time;
        self.duration = Some(duration);
        self
    }

    pub fn with_fade(mut self, fade_duration: f64) -> Self {
        self.fade_duration = fade_duration;
        self
    }

    /// Check the timing against a clip of `clip_duration` seconds
    pub fn window(&self, clip_duration: f64) -> Result<OverlayWindow> {
        let out_of_range = |name: &str, value: f64, expected: &str| ParameterError::OutOfRange {
            name: name.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(out_of_range("start_time", self.start_time, "a non-negative number of seconds").into());
        }
        let duration = self.duration.unwrap_or(clip_duration - self.start_time);
        if !duration.is_finite() || duration <= 0.0 || self.start_time + duration > clip_duration + WINDOW_TOLERANCE {
            return Err(ParameterError::OverlayExceedsClip {
                start: self.start_time,
                duration,
                clip_duration,
            }
            .into());
        }
        if !self.fade_duration.is_finite() || self.fade_duration < 0.0 {
            return Err(out_of_range("fade_duration", self.fade_duration, "a non-negative number of seconds").into());
        }
        if self.fade_duration * 2.0 > duration + WINDOW_TOLERANCE {
            return Err(ParameterError::FadeTooLong {
                fade: self.fade_duration,
                duration,
            }
            .into());
        }

        Ok(OverlayWindow {
            start: self.start_time,
            duration,
            fade: self.fade_duration,
        })
    }
}

/// Validated timing of an overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayWindow {
    pub start: f64,
    pub duration: f64,
    pub fade: f64,
}

impl OverlayWindow {
    /// Indices of the frames at `fps` whose timestamps fall in `[start, start + duration]`.
    ///
    /// Both ends are inclusive: a frame landing exactly on `start + duration` is drawn.
    pub fn frame_range(&self, fps: f64, frame_count: usize) -> std::ops::Range<usize> {
        let first = ((self.start * fps) - WINDOW_TOLERANCE).ceil().max(0.0) as usize;
        let last = (((self.start + self.duration) * fps) + WINDOW_TOLERANCE).floor().max(0.0) as usize;
        let first = first.min(frame_count);
        first..(last + 1).clamp(first, frame_count)
    }

    /// Overlay opacity at clip time `t`: a linear ramp up over the fade-in and down over the fade-out
    pub fn opacity(&self, t: f64) -> f64 {
        if self.fade <= 0.0 {
            return 1.0;
        }
        let local = t - self.start;
        let fade_in = local / self.fade;
        let fade_out = (self.duration - local) / self.fade;
        fade_in.min(fade_out).clamp(0.0, 1.0)
    }
}

/// A rendered overlay image and where it sits on the frame
#[derive(Debug, Clone)]
pub struct Layer {
    pub image: RgbaImage,
    pub x: i64,
    pub y: i64,
}

/// Draw `layer` over `frame` with its alpha scaled by `opacity`
pub fn composite_layer(frame: &Frame, layer: &Layer, opacity: f64) -> Frame {
    let mut out = frame.clone();
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return out;
    }

    let (width, height) = frame.size();
    for (lx, ly, pixel) in layer.image.enumerate_pixels() {
        let x = layer.x + lx as i64;
        let y = layer.y + ly as i64;
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            continue;
        }
        let [r, g, b, a] = pixel.0;
        let alpha = a as f64 / 255.0 * opacity;
        if alpha <= 0.0 {
            continue;
        }
        let (x, y) = (x as u32, y as u32);
        let base = out.get_pixel(x, y);
        let src = [r, g, b];
        let rgb = std::array::from_fn(|c| (src[c] as f64 * alpha + base[c] as f64 * (1.0 - alpha)).round() as u8);
        out.set_pixel(x, y, rgb);
    }
    out
}

/// Draw `layer` on every frame of `clip` inside `window`, in parallel.
///
/// Frames outside the window are the input clip's own frames.
pub fn add_layer(clip: &Clip, layer: &Layer, window: &OverlayWindow) -> Result<Clip> {
    let fps = clip.fps();
    let range = window.frame_range(fps, clip.frame_count());
    debug!("Compositing overlay onto frames {}..{}", range.start, range.end);

    let drawn: Vec<Arc<Frame>> = clip.frames()[range.clone()]
        .par_iter()
        .enumerate()
        .map(|(offset, frame)| {
            let t = (range.start + offset) as f64 / fps;
            Arc::new(composite_layer(frame, layer, window.opacity(t)))
        })
        .collect();

    let mut frames = Vec::with_capacity(clip.frame_count());
    frames.extend(clip.frames()[..range.start].iter().cloned());
    frames.extend(drawn);
    frames.extend(clip.frames()[range.end..].iter().cloned());

    Ok(Clip::from_shared(frames, fps)?.with_audio(clip.audio().clone()))
}

/// Renders overlay specs into layers and draws them onto clips
pub struct OverlayCompositor {
    default_font: Option<PathBuf>,
    renderers: HashMap<PathBuf, TextRenderer>,
}

impl OverlayCompositor {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            default_font: config.default_font.clone(),
            renderers: HashMap::new(),
        }
    }

    pub fn with_default_font<P: Into<PathBuf>>(mut self, font: P) -> Self {
        self.default_font = Some(font.into());
        self
    }

    /// Draw one overlay onto `clip`
    pub fn add_overlay(&mut self, clip: &Clip, spec: &OverlaySpec) -> Result<Clip> {
        let window = spec.window(clip.duration())?;
        let image = self.render(&spec.content, clip.width())?;
        let (x, y) = spec.position.place(clip.size(), image.dimensions());
        info!(
            "Adding {} overlay at ({}, {}) from {:.2}s for {:.2}s",
            match spec.content {
                OverlayContent::Text(_) => "text",
                OverlayContent::Logo(_) => "logo",
            },
            x,
            y,
            window.start,
            window.duration
        );
        add_layer(clip, &Layer { image, x, y }, &window)
    }

    /// Draw `specs` in order, each over the result of the previous
    pub fn apply_overlays(&mut self, clip: &Clip, specs: &[OverlaySpec]) -> Result<Clip> {
        let mut current = clip.clone();
        for spec in specs {
            current = self.add_overlay(&current, spec)?;
        }
        Ok(current)
    }

    /// Open the request's video, draw its overlays and write the result to `output`
    pub fn run_request<S: FrameSource + ?Sized>(
        &mut self,
        source: &S,
        request: &OverlayRequest,
        output: &Path,
    ) -> Result<WrittenClip> {
        let clip = source.open_clip(&request.video_path)?;
        let composed = self.apply_overlays(&clip, &request.overlays)?;
        source.write_clip(&composed, output)
    }

    fn render(&mut self, content: &OverlayContent, frame_width: u32) -> Result<RgbaImage> {
        match content {
            OverlayContent::Logo(spec) => load_logo(spec),
            OverlayContent::Text(style) => {
                let font = style
                    .font
                    .clone()
                    .or_else(|| self.default_font.clone())
                    .ok_or_else(|| ConfigError::MissingKey {
                        key: "overlay.default_font".to_string(),
                    })?;
                if !self.renderers.contains_key(&font) {
                    let renderer = TextRenderer::from_file(&font)?;
                    self.renderers.insert(font.clone(), renderer);
                }
                let renderer = self
                    .renderers
                    .get(&font)
                    .ok_or_else(|| CompositorError::generic("font cache lost an entry"))?;
                Ok(renderer.render(style, Some(frame_width)))
            }
        }
    }
}

/// A clip and the overlays to draw on it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlayRequest {
    pub video_path: PathBuf,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    pub overlays: Vec<OverlaySpec>,
}

impl OverlayRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ParameterError::Malformed {
                context: "overlay request".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_json(&json)
    }
}

/// Position as written in a request: a name or an `[x, y]` pair
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Named(String),
    Point(i64, i64),
}

/// Flat wire form of [`OverlaySpec`]
#[derive(Debug, Deserialize)]
struct RawOverlay {
    text: Option<String>,
    logo_path: Option<PathBuf>,
    position: Option<RawPosition>,
    #[serde(alias = "x_position")]
    x: Option<i64>,
    #[serde(alias = "y_position")]
    y: Option<i64>,
    #[serde(default)]
    start_time: f64,
    duration: Option<f64>,
    #[serde(default)]
    fade_duration: f64,
    fontsize: Option<f32>,
    color: Option<Color>,
    font: Option<PathBuf>,
    bg_color: Option<String>,
    stroke_color: Option<String>,
    stroke_width: Option<f32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// `None` for a missing or "transparent" color
fn optional_color(value: Option<String>) -> std::result::Result<Option<Color>, ParameterError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().eq_ignore_ascii_case("transparent") || v.trim().is_empty() => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

impl TryFrom<RawOverlay> for OverlaySpec {
    type Error = ParameterError;

    fn try_from(raw: RawOverlay) -> std::result::Result<Self, Self::Error> {
        let malformed = |reason: &str| ParameterError::Malformed {
            context: "overlay".to_string(),
            reason: reason.to_string(),
        };

        let content = match (raw.text, raw.logo_path) {
            (Some(text), None) => {
                let mut style = TextStyle::new(text);
                if let Some(size) = raw.fontsize {
                    style.fontsize = size;
                }
                if let Some(color) = raw.color {
                    style.color = color;
                }
                if let Some(width) = raw.stroke_width {
                    style.stroke_width = width;
                }
                style.font = raw.font;
                style.bg_color = optional_color(raw.bg_color)?;
                style.stroke_color = optional_color(raw.stroke_color)?;
                if !(style.fontsize.is_finite() && style.fontsize > 0.0) {
                    return Err(ParameterError::OutOfRange {
                        name: "fontsize".to_string(),
                        value: style.fontsize.to_string(),
                        expected: "a positive size in pixels".to_string(),
                    });
                }
                OverlayContent::Text(style)
            }
            (None, Some(path)) => OverlayContent::Logo(LogoSpec {
                path,
                width: raw.width,
                height: raw.height,
            }),
            (Some(_), Some(_)) => return Err(malformed("an overlay has either text or a logo_path, not both")),
            (None, None) => return Err(malformed("an overlay needs text or a logo_path")),
        };

        let position = match (raw.position, raw.x, raw.y) {
            (_, Some(x), Some(y)) => OverlayPosition::At { x, y },
            (_, Some(_), None) | (_, None, Some(_)) => return Err(malformed("x and y must be given together")),
            (Some(RawPosition::Point(x, y)), None, None) => OverlayPosition::At { x, y },
            (Some(RawPosition::Named(name)), None, None) => OverlayPosition::Anchor(name.parse()?),
            (None, None, None) => match content {
                OverlayContent::Text(_) => OverlayPosition::Anchor(Anchor::Center),
                OverlayContent::Logo(_) => OverlayPosition::At { x: 0, y: 0 },
            },
        };

        Ok(OverlaySpec {
            content,
            position,
            start_time: raw.start_time,
            duration: raw.duration,
            fade_duration: raw.fade_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{solid_clip, MemoryFrameSource, FIXTURE_FONT};
    use image::Rgba;

    fn white_square(size: u32) -> Layer {
        Layer {
            image: RgbaImage::from_pixel(size, size, Rgba([255, 255, 255, 255])),
            x: 4,
            y: 4,
        }
    }

    fn write_logo(dir: &Path) -> PathBuf {
        let path = dir.join("logo.png");
        RgbaImage::from_pixel(8, 8, Rgba([255, 255, 0, 255])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_frames_outside_window_are_untouched() {
        let clip = solid_clip([0, 0, 128], 2.0);
        let window = OverlaySpec::logo(LogoSpec::new("unused.png"))
            .between(0.5, 1.0)
            .window(clip.duration())
            .unwrap();
        let out = add_layer(&clip, &white_square(8), &window).unwrap();

        assert_eq!(out.frame_count(), clip.frame_count());
        for i in (0..12).chain(37..48) {
            assert!(Arc::ptr_eq(&out.frames()[i], &clip.frames()[i]), "frame {}", i);
        }
        // Frame 36 sits exactly on the window end and is drawn
        for i in 12..=36 {
            assert_eq!(out.frames()[i].get_pixel(5, 5), [255, 255, 255]);
            assert_eq!(out.frames()[i].get_pixel(20, 20), [0, 0, 128]);
        }
    }

    #[test]
    fn test_frame_range_includes_both_ends() {
        let window = OverlayWindow {
            start: 0.5,
            duration: 1.0,
            fade: 0.0,
        };
        assert_eq!(window.frame_range(24.0, 48), 12..37);
        // Clamped to the clip
        let tail = OverlayWindow {
            start: 1.0,
            duration: 1.0,
            fade: 0.0,
        };
        assert_eq!(tail.frame_range(24.0, 48), 24..48);
        // A window end between two frames stops at the earlier one
        let between = OverlayWindow {
            start: 0.0,
            duration: 0.51,
            fade: 0.0,
        };
        assert_eq!(between.frame_range(24.0, 48), 0..13);
    }

    #[test]
    fn test_text_overlay_draws_inside_its_box_and_window() {
        let clip = solid_clip([0, 0, 0], 1.0);
        let mut style = TextStyle::new("AD");
        style.fontsize = 20.0;
        let spec = OverlaySpec::text(style.clone())
            .positioned(OverlayPosition::At { x: 10, y: 8 })
            .between(0.25, 0.5);

        let mut compositor = OverlayCompositor::new(&OverlayConfig {
            default_font: Some(PathBuf::from(FIXTURE_FONT)),
        });
        let out = compositor.apply_overlays(&clip, &[spec]).unwrap();
        assert_eq!(out.frame_count(), clip.frame_count());

        let (box_w, box_h) = TextRenderer::from_file(FIXTURE_FONT)
            .unwrap()
            .render(&style, Some(clip.width()))
            .dimensions();
        let inside = |x: u32, y: u32| x >= 10 && x < 10 + box_w && y >= 8 && y < 8 + box_h;

        // Window covers frames 6..=18 at 24fps
        for (i, frame) in out.frames().iter().enumerate() {
            if !(6..=18).contains(&i) {
                assert!(Arc::ptr_eq(frame, &clip.frames()[i]), "frame {}", i);
                continue;
            }
            let mut lit = 0;
            for y in 0..frame.height() {
                for x in 0..frame.width() {
                    let pixel = frame.get_pixel(x, y);
                    if inside(x, y) {
                        if pixel != [0, 0, 0] {
                            lit += 1;
                        }
                    } else {
                        assert_eq!(pixel, [0, 0, 0], "frame {} pixel ({}, {})", i, x, y);
                    }
                }
            }
            assert!(lit > 0, "frame {} has no text", i);
        }
    }

    #[test]
    fn test_fade_ramps_opacity() {
        let window = OverlayWindow {
            start: 1.0,
            duration: 2.0,
            fade: 0.5,
        };
        assert_eq!(window.opacity(1.0), 0.0);
        assert!((window.opacity(1.25) - 0.5).abs() < 1e-9);
        assert_eq!(window.opacity(2.0), 1.0);
        assert!((window.opacity(2.75) - 0.5).abs() < 1e-9);

        let clip = solid_clip([0, 0, 0], 3.0);
        let out = add_layer(&clip, &white_square(4), &window).unwrap();
        // First window frame is fully transparent, the middle fully opaque
        assert_eq!(out.frames()[24].get_pixel(5, 5), [0, 0, 0]);
        assert_eq!(out.frames()[48].get_pixel(5, 5), [255, 255, 255]);
        let ramp = out.frames()[30].get_pixel(5, 5)[0];
        assert!(ramp > 100 && ramp < 155);
    }

    #[test]
    fn test_window_validation() {
        let spec = OverlaySpec::logo(LogoSpec::new("logo.png"));
        assert!(matches!(
            spec.clone().between(1.5, 1.0).window(2.0),
            Err(CompositorError::InvalidParameter(ParameterError::OverlayExceedsClip { .. }))
        ));
        assert!(matches!(
            spec.clone().between(0.0, 1.0).with_fade(0.6).window(2.0),
            Err(CompositorError::InvalidParameter(ParameterError::FadeTooLong { .. }))
        ));
        assert!(spec.clone().between(-0.5, 1.0).window(2.0).is_err());
        assert!(spec.clone().between(0.0, 1.0).with_fade(0.5).window(2.0).is_ok());

        // Open-ended overlays run to the clip end
        let mut open = spec;
        open.start_time = 0.5;
        assert_eq!(open.window(2.0).unwrap().duration, 1.5);
    }

    #[test]
    fn test_anchor_placement() {
        let frame = (100, 50);
        let layer = (20, 10);
        assert_eq!(OverlayPosition::Anchor(Anchor::Center).place(frame, layer), (40, 20));
        assert_eq!(OverlayPosition::Anchor(Anchor::BottomRight).place(frame, layer), (80, 40));
        assert_eq!(OverlayPosition::Anchor(Anchor::Top).place(frame, layer), (40, 0));
        assert_eq!(OverlayPosition::At { x: -5, y: 7 }.place(frame, layer), (-5, 7));
        assert_eq!("Bottom_Left".parse::<Anchor>().unwrap(), Anchor::BottomLeft);
        assert!("middle".parse::<Anchor>().is_err());
    }

    #[test]
    fn test_layer_is_clipped_at_frame_edges() {
        let frame = Frame::new_black(8, 8);
        let layer = Layer {
            image: RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])),
            x: 6,
            y: -2,
        };
        let out = composite_layer(&frame, &layer, 1.0);
        assert_eq!(out.get_pixel(7, 0), [255, 0, 0]);
        assert_eq!(out.get_pixel(7, 1), [255, 0, 0]);
        assert_eq!(out.get_pixel(7, 2), [0, 0, 0]);
        assert_eq!(out.get_pixel(5, 0), [0, 0, 0]);
    }

    #[test]
    fn test_overlays_apply_in_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let logo = write_logo(dir.path());
        let clip = solid_clip([0, 0, 0], 1.0);

        let specs = vec![
            OverlaySpec::logo(LogoSpec::new(&logo)),
            OverlaySpec::logo(LogoSpec::new(&logo))
                .positioned(OverlayPosition::At { x: 4, y: 4 })
                .between(0.0, 0.5),
        ];
        let mut compositor = OverlayCompositor::new(&OverlayConfig::default());
        let out = compositor.apply_overlays(&clip, &specs).unwrap();

        // The first logo stays everywhere, the second only in the first half
        assert_eq!(out.frames()[0].get_pixel(1, 1), [255, 255, 0]);
        assert_eq!(out.frames()[0].get_pixel(10, 10), [255, 255, 0]);
        assert_eq!(out.frames()[20].get_pixel(1, 1), [255, 255, 0]);
        assert_eq!(out.frames()[20].get_pixel(10, 10), [0, 0, 0]);
    }

    #[test]
    fn test_text_without_any_font_is_a_config_error() {
        let clip = solid_clip([0, 0, 0], 1.0);
        let mut compositor = OverlayCompositor::new(&OverlayConfig::default());
        let err = compositor
            .add_overlay(&clip, &OverlaySpec::text(TextStyle::new("Sale")))
            .unwrap_err();
        assert!(matches!(err, CompositorError::Config(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_request_json() {
        let request = OverlayRequest::from_json(
            r##"{
                "video_path": "ad.mp4",
                "overlays": [
                    {"text": "Sale", "fontsize": 40, "color": "#ff0000", "position": "bottom",
                     "start_time": 1.0, "duration": 2.0, "fade_duration": 0.5,
                     "bg_color": "transparent", "stroke_color": "black", "stroke_width": 2},
                    {"logo_path": "logo.png", "width": 64, "height": 32, "x_position": 10, "y_position": 20,
                     "start_time": 0, "duration": 3},
                    {"text": "Corner", "position": [5, 6]}
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(request.video_path, PathBuf::from("ad.mp4"));
        assert_eq!(request.overlays.len(), 3);

        let text = &request.overlays[0];
        assert_eq!(text.position, OverlayPosition::Anchor(Anchor::Bottom));
        assert_eq!(text.fade_duration, 0.5);
        match &text.content {
            OverlayContent::Text(style) => {
                assert_eq!(style.fontsize, 40.0);
                assert_eq!(style.color, Color([255, 0, 0]));
                assert_eq!(style.bg_color, None);
                assert_eq!(style.stroke_color, Some(Color::BLACK));
            }
            other => panic!("expected text, got {:?}", other),
        }

        let logo = &request.overlays[1];
        assert_eq!(logo.position, OverlayPosition::At { x: 10, y: 20 });
        assert_eq!(
            logo.content,
            OverlayContent::Logo(LogoSpec::new("logo.png").sized(64, 32))
        );

        assert_eq!(request.overlays[2].position, OverlayPosition::At { x: 5, y: 6 });
        assert_eq!(request.overlays[2].duration, None);
    }

    #[test]
    fn test_request_rejects_ambiguous_overlays() {
        let both = r#"{"video_path": "a.mp4", "overlays": [{"text": "x", "logo_path": "l.png"}]}"#;
        assert!(OverlayRequest::from_json(both).is_err());
        let unknown = r#"{"video_path": "a.mp4", "overlays": [{"text": "x", "position": "middle"}]}"#;
        let err = OverlayRequest::from_json(unknown).unwrap_err();
        assert!(err.to_string().contains("middle"));
    }

    #[test]
    fn test_run_request_writes_through_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let logo = write_logo(dir.path());
        let source = MemoryFrameSource::new();
        source.insert("ad.mp4", solid_clip([0, 0, 0], 1.0));

        let request = OverlayRequest {
            video_path: PathBuf::from("ad.mp4"),
            output_path: None,
            overlays: vec![OverlaySpec::logo(LogoSpec::new(&logo))],
        };
        let mut compositor = OverlayCompositor::new(&OverlayConfig::default());
        let written = compositor
            .run_request(&source, &request, Path::new("out.mp4"))
            .unwrap();

        assert_eq!(written.frame_count, 24);
        let outputs = source.written();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].1.first_frame().get_pixel(0, 0), [255, 255, 0]);
    }
}
