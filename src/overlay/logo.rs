//! Logo images for overlays.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use tracing::debug;

use crate::error::{CompositorError, ParameterError, Result};

/// A logo image and the size to draw it at
#[derive(Debug, Clone, PartialEq)]
pub struct LogoSpec {
    pub path: PathBuf,
    /// Target width in pixels; derived from the aspect ratio when only `height` is set
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl LogoSpec {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            width: None,
            height: None,
        }
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Decode the logo at `spec.path` and scale it to the requested size
pub fn load_logo(spec: &LogoSpec) -> Result<RgbaImage> {
    let image = open_rgba(&spec.path)?;
    scale_logo(image, spec.width, spec.height)
}

fn open_rgba(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).map_err(|e| CompositorError::source_read(path, e.to_string()))?;
    Ok(image.to_rgba8())
}

/// Resize to `width` x `height`, filling in a missing side from the aspect ratio
pub fn scale_logo(image: RgbaImage, width: Option<u32>, height: Option<u32>) -> Result<RgbaImage> {
    for (name, value) in [("width", width), ("height", height)] {
        if value == Some(0) {
            return Err(ParameterError::OutOfRange {
                name: format!("logo {}", name),
                value: "0".to_string(),
                expected: "at least 1 pixel".to_string(),
            }
            .into());
        }
    }

    let (w, h) = image.dimensions();
    let aspect = w as f64 / h as f64;
    let target = match (width, height) {
        (None, None) => return Ok(image),
        (Some(tw), Some(th)) => (tw, th),
        (Some(tw), None) => (tw, ((tw as f64 / aspect).round() as u32).max(1)),
        (None, Some(th)) => (((th as f64 * aspect).round() as u32).max(1), th),
    };
    if target == (w, h) {
        return Ok(image);
    }

    debug!("Scaling logo from {}x{} to {}x{}", w, h, target.0, target.1);
    Ok(image::imageops::resize(&image, target.0, target.1, FilterType::Lanczos3))
}
