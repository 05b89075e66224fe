use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CompositorError, MediaError, Result};
use crate::video::audio::AudioTrack;
use crate::video::types::{Clip, Frame};

/// Stream metadata reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMetadata {
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Decodes video files into clips by shelling out to ffprobe and ffmpeg
#[derive(Debug, Clone)]
pub struct ClipLoader {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl Default for ClipLoader {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl ClipLoader {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg_path: P, ffprobe_path: Q) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Read stream metadata without decoding any frames
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<ClipMetadata> {
        let path = path.as_ref();
        ensure_readable(path)?;

        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path);
        let output = run_tool(&self.ffprobe_path, &mut cmd)?;

        if !output.status.success() {
            return Err(CompositorError::source_read(
                path,
                format!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            ));
        }

        let metadata = parse_probe_output(&output.stdout)
            .map_err(|reason| CompositorError::source_read(path, reason))?;

        debug!(
            "Probed {}: {}x{} @ {:.3}fps, {:.3}s, audio: {}",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.duration,
            metadata.has_audio
        );
        Ok(metadata)
    }

    /// Decode every frame of `path` into memory
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Clip> {
        let path = path.as_ref();
        let metadata = self.probe(path)?;

        info!(
            "Decoding {} ({}x{}, {:.2}s)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.duration
        );

        // Constant frame rate output so frame index maps directly onto time
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-v", "error", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-vsync", "cfr", "-r"])
            .arg(format!("{}", metadata.fps))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
        let output = run_tool(&self.ffmpeg_path, &mut cmd)?;

        if !output.status.success() {
            return Err(CompositorError::source_read(
                path,
                format!("ffmpeg decode failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            ));
        }

        let frames = split_frames(output.stdout, metadata.width, metadata.height)
            .map_err(|reason| CompositorError::source_read(path, reason))?;

        let clip = Clip::new(frames, metadata.fps)?;
        if (clip.duration() - metadata.duration).abs() > 2.0 * clip.frame_interval() {
            warn!(
                "{}: decoded {:.3}s of video but the container reports {:.3}s",
                path.display(),
                clip.duration(),
                metadata.duration
            );
        }

        let audio = if metadata.has_audio {
            AudioTrack::from_source(path, clip.duration())
        } else {
            AudioTrack::silence(clip.duration())
        };

        debug!("Decoded {} frames from {}", clip.frame_count(), path.display());
        Ok(clip.with_audio(audio))
    }
}

fn ensure_readable(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CompositorError::source_read(path, "file does not exist"))
    }
}

/// Run an external tool to completion, mapping a missing binary to `ToolUnavailable`
pub(crate) fn run_tool(tool: &Path, cmd: &mut Command) -> Result<Output> {
    cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            MediaError::ToolUnavailable {
                tool: tool.display().to_string(),
            }
            .into()
        } else {
            CompositorError::Io(e)
        }
    })
}

fn parse_probe_output(json: &[u8]) -> std::result::Result<ClipMetadata, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream".to_string())?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no frame size".to_string()),
    };

    let fps = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_frame_rate(rate))
        .ok_or_else(|| "video stream has no frame rate".to_string())?;

    let duration = video
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| "unknown duration".to_string())?;

    Ok(ClipMetadata {
        duration,
        fps,
        width,
        height,
        has_audio,
    })
}

/// Parse ffprobe's rational frame rates such as `30000/1001` or `24/1`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn split_frames(raw: Vec<u8>, width: u32, height: u32) -> std::result::Result<Vec<Frame>, String> {
    let frame_len = width as usize * height as usize * 3;
    if raw.len() < frame_len {
        return Err("decoder produced no frames".to_string());
    }
    if raw.len() % frame_len != 0 {
        warn!(
            "Dropping {} trailing bytes of a partial frame",
            raw.len() % frame_len
        );
    }

    raw.chunks_exact(frame_len)
        .map(|chunk| {
            Frame::from_rgb_bytes(width, height, chunk.to_vec())
                .ok_or_else(|| "frame buffer has the wrong size".to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 640, "height": 360,
             "avg_frame_rate": "24/1", "r_frame_rate": "24/1", "duration": "2.000000"},
            {"codec_type": "audio", "duration": "2.010000"}
        ],
        "format": {"duration": "2.010000"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let metadata = parse_probe_output(PROBE_JSON.as_bytes()).unwrap();
        assert_eq!(metadata.width, 640);
        assert_eq!(metadata.height, 360);
        assert!((metadata.fps - 24.0).abs() < 1e-9);
        assert!((metadata.duration - 2.0).abs() < 1e-9);
        assert!(metadata.has_audio);
    }

    #[test]
    fn test_probe_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 4, "height": 2, "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "3.5"}
        }"#;
        let metadata = parse_probe_output(json.as_bytes()).unwrap();
        assert!((metadata.fps - 25.0).abs() < 1e-9);
        assert!((metadata.duration - 3.5).abs() < 1e-9);
        assert!(!metadata.has_audio);
    }

    #[test]
    fn test_probe_without_video_stream_fails() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(parse_probe_output(json.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_split_frames() {
        let raw = vec![7u8; 2 * 2 * 3 * 3 + 5];
        let frames = split_frames(raw, 2, 2).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].get_pixel(1, 1), [7, 7, 7]);
        assert!(split_frames(vec![0u8; 4], 2, 2).is_err());
    }

    #[test]
    fn test_missing_file_is_source_read_failure() {
        let loader = ClipLoader::default();
        let err = loader.load("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Media(MediaError::SourceReadFailure { .. })
        ));
    }
}
