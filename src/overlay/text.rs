//! Text rasterisation for overlays.

use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle as GlyphRun, WrapStyle};
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};

use crate::error::{CompositorError, ParameterError, Result};
use crate::video::types::Color;

/// Styling for a text overlay
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub text: String,
    /// Font size in pixels
    pub fontsize: f32,
    pub color: Color,
    /// Font file; the compositor's default font when `None`
    pub font: Option<PathBuf>,
    /// Box behind the text, transparent when `None`
    pub bg_color: Option<Color>,
    /// Outline color, no outline when `None`
    pub stroke_color: Option<Color>,
    pub stroke_width: f32,
}

impl TextStyle {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            fontsize: 50.0,
            color: Color::WHITE,
            font: None,
            bg_color: None,
            stroke_color: None,
            stroke_width: 1.0,
        }
    }

    /// Outline radius in whole pixels, zero without an outline
    pub fn stroke_radius(&self) -> u32 {
        match self.stroke_color {
            Some(_) if self.stroke_width > 0.0 => self.stroke_width.ceil() as u32,
            _ => 0,
        }
    }
}

/// 8-bit glyph coverage for a block of text
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMask {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl CoverageMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0; (width * height) as usize],
        }
    }

    pub fn get(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        self.coverage[(y as u32 * self.width + x as u32) as usize]
    }

    /// Coverage grown by `radius` pixels in every direction
    pub fn dilated(&self, radius: u32) -> CoverageMask {
        if radius == 0 {
            return self.clone();
        }
        let r = radius as i64;
        let mut out = CoverageMask::empty(self.width, self.height);
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                let mut peak = 0u8;
                for dy in -r..=r {
                    for dx in -r..=r {
                        if dx * dx + dy * dy <= r * r {
                            peak = peak.max(self.get(x + dx, y + dy));
                        }
                    }
                }
                out.coverage[(y as u32 * self.width + x as u32) as usize] = peak;
            }
        }
        out
    }
}

/// Lays out and rasterises text with a single font
pub struct TextRenderer {
    font: Font,
}

impl TextRenderer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CompositorError::source_read(path, e.to_string()))?;
        Self::from_bytes(bytes).map_err(|e| match e {
            CompositorError::InvalidParameter(ParameterError::Malformed { reason, .. }) => {
                CompositorError::source_read(path, reason)
            }
            other => other,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| ParameterError::Malformed {
            context: "font".to_string(),
            reason: reason.to_string(),
        })?;
        Ok(Self { font })
    }

    /// Rasterise `text` at `size` pixels, wrapping at `max_width` and leaving
    /// `padding` empty pixels on every side.
    pub fn rasterize(&self, text: &str, size: f32, max_width: Option<f32>, padding: u32) -> CoverageMask {
        let pad = padding as f32;
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: pad,
            y: pad,
            max_width: max_width.map(|w| (w - 2.0 * pad).max(size)),
            wrap_style: WrapStyle::Word,
            wrap_hard_breaks: true,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &GlyphRun::new(text, size, 0));

        let glyphs = layout.glyphs();
        let right = glyphs
            .iter()
            .map(|g| g.x + g.width as f32)
            .fold(pad, f32::max);
        let bottom = glyphs
            .iter()
            .map(|g| g.y + g.height as f32)
            .fold(pad + layout.height(), f32::max);

        let mut mask = CoverageMask::empty(
            (right + pad).ceil().max(1.0) as u32,
            (bottom + pad).ceil().max(1.0) as u32,
        );

        for glyph in glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, bitmap) = self.font.rasterize_config(glyph.key);
            let origin_x = glyph.x.round() as i64;
            let origin_y = glyph.y.round() as i64;
            for row in 0..glyph.height {
                for col in 0..glyph.width {
                    let x = origin_x + col as i64;
                    let y = origin_y + row as i64;
                    if x < 0 || y < 0 || x >= mask.width as i64 || y >= mask.height as i64 {
                        continue;
                    }
                    let idx = (y as u32 * mask.width + x as u32) as usize;
                    mask.coverage[idx] = mask.coverage[idx].max(bitmap[row * glyph.width + col]);
                }
            }
        }
        mask
    }

    /// Render `style` into an RGBA layer no wider than `max_width`
    pub fn render(&self, style: &TextStyle, max_width: Option<u32>) -> RgbaImage {
        let mask = self.rasterize(
            &style.text,
            style.fontsize,
            max_width.map(|w| w as f32),
            style.stroke_radius(),
        );
        paint_text(&mask, style)
    }
}

/// Source-over for straight alpha
fn over(dst: [u8; 4], src: [u8; 3], alpha: u8) -> [u8; 4] {
    if alpha == 0 {
        return dst;
    }
    let sa = alpha as f64 / 255.0;
    let da = dst[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (src[c] as f64 * sa + dst[c] as f64 * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    out
}

/// Color a coverage mask: optional background box, then outline, then glyphs
pub fn paint_text(mask: &CoverageMask, style: &TextStyle) -> RgbaImage {
    let stroke = style
        .stroke_color
        .map(|color| (color, mask.dilated(style.stroke_radius())));
    let background = style.bg_color.map(|c| {
        let [r, g, b] = c.rgb();
        [r, g, b, 255]
    });

    RgbaImage::from_fn(mask.width, mask.height, |x, y| {
        let mut pixel = background.unwrap_or([0, 0, 0, 0]);
        if let Some((color, outline)) = &stroke {
            pixel = over(pixel, color.rgb(), outline.get(x as i64, y as i64));
        }
        pixel = over(pixel, style.color.rgb(), mask.get(x as i64, y as i64));
        Rgba(pixel)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FIXTURE_FONT;

    fn dot_mask() -> CoverageMask {
        let mut mask = CoverageMask::empty(9, 9);
        mask.coverage[4 * 9 + 4] = 255;
        mask
    }

    #[test]
    fn test_dilation_grows_coverage() {
        let grown = dot_mask().dilated(2);
        assert_eq!(grown.get(4, 4), 255);
        assert_eq!(grown.get(6, 4), 255);
        assert_eq!(grown.get(4, 2), 255);
        assert_eq!(grown.get(6, 6), 0);
        assert_eq!(grown.get(-1, 0), 0);
    }

    #[test]
    fn test_paint_text_layers_outline_under_glyphs() {
        let mut style = TextStyle::new("x");
        style.color = Color::WHITE;
        style.stroke_color = Some(Color::BLACK);
        style.stroke_width = 1.0;
        let layer = paint_text(&dot_mask(), &style);

        assert_eq!(layer.get_pixel(4, 4).0, [255, 255, 255, 255]);
        assert_eq!(layer.get_pixel(5, 4).0, [0, 0, 0, 255]);
        assert_eq!(layer.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_background_fills_the_box() {
        let mut style = TextStyle::new("x");
        style.bg_color = Some(Color([0, 0, 255]));
        let layer = paint_text(&dot_mask(), &style);
        assert_eq!(layer.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(layer.get_pixel(4, 4).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        assert!(TextRenderer::from_bytes(vec![0, 1, 2, 3]).is_err());
        assert!(TextRenderer::from_file("/nonexistent/font.ttf").is_err());
    }

    #[test]
    fn test_rasterize_fixture_font() {
        let renderer = TextRenderer::from_file(FIXTURE_FONT).unwrap();
        let mask = renderer.rasterize("Hello", 32.0, None, 2);
        assert!(mask.width > 40);
        assert!(mask.height >= 32);
        assert!(mask.coverage.iter().any(|&c| c == 255));
        // Padding stays clear
        assert!((0..mask.height as i64).all(|y| mask.get(0, y) == 0));

        let one_line = renderer.rasterize("Hello there world", 32.0, None, 0);
        let wrapped = renderer.rasterize("Hello there world", 32.0, Some(120.0), 0);
        assert!(wrapped.width < one_line.width);
        assert!(wrapped.height > one_line.height);
    }
}
