use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CompositorError, MediaError, Result};
use crate::video::audio::{AudioSpan, AudioTrack};
use crate::video::types::Clip;

/// Encoding parameters for written clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Frame rate used when a caller does not carry one of its own
    pub fps: f64,
    /// Video codec passed to ffmpeg's `-c:v`
    pub codec: String,
    /// Quality 0-100, mapped onto x264's CRF scale
    pub quality: u8,
    pub audio_codec: String,
    pub audio_sample_rate: u32,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 24.0,
            codec: "libx264".to_string(),
            quality: 85,
            audio_codec: "aac".to_string(),
            audio_sample_rate: 44100,
        }
    }
}

impl VideoParams {
    /// CRF value for the configured quality (0 is lossless, 51 the worst)
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }
}

/// A clip that has been encoded to disk
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenClip {
    pub path: PathBuf,
    pub duration: f64,
    pub frame_count: usize,
    pub file_size: u64,
}

/// Encodes clips by piping raw frames into ffmpeg.
///
/// Output is written to a hidden temporary file next to the destination and
/// only renamed onto it once ffmpeg exits successfully, so a failed write never
/// leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct ClipWriter {
    ffmpeg_path: PathBuf,
    params: VideoParams,
}

impl ClipWriter {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P, params: VideoParams) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            params,
        }
    }

    pub fn params(&self) -> &VideoParams {
        &self.params
    }

    pub fn write<P: AsRef<Path>>(&self, clip: &Clip, path: P) -> Result<WrittenClip> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| CompositorError::sink_write(path, e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4");
        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(&dir)
            .map_err(|e| CompositorError::sink_write(path, e.to_string()))?;

        info!(
            "Encoding {} frames ({}x{} @ {:.3}fps) to {}",
            clip.frame_count(),
            clip.width(),
            clip.height(),
            clip.fps(),
            path.display()
        );

        let args = self.encode_args(clip, partial.path());
        debug!("ffmpeg {}", args.join(" "));

        self.run_encoder(clip, &args, path)?;

        partial
            .persist(path)
            .map_err(|e| CompositorError::sink_write(path, e.error.to_string()))?;

        let file_size = std::fs::metadata(path)?.len();
        info!("Wrote {} ({} KB)", path.display(), file_size / 1024);

        Ok(WrittenClip {
            path: path.to_path_buf(),
            duration: clip.duration(),
            frame_count: clip.frame_count(),
            file_size,
        })
    }

    /// Full ffmpeg argument list for encoding `clip` into `output`
    fn encode_args(&self, clip: &Clip, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend([
            "-s".to_string(),
            format!("{}x{}", clip.width(), clip.height()),
            "-r".to_string(),
            format!("{}", clip.fps()),
            "-i".to_string(),
            "pipe:0".to_string(),
        ]);

        let audio = clip.audio();
        if audio.has_audio() {
            args.extend(self.audio_input_args(audio));
            args.extend([
                "-filter_complex".to_string(),
                self.audio_filter(audio),
                "-map".to_string(),
                "0:v".to_string(),
                "-map".to_string(),
                "[aout]".to_string(),
                "-c:a".to_string(),
                self.params.audio_codec.clone(),
                "-ar".to_string(),
                self.params.audio_sample_rate.to_string(),
            ]);
        } else {
            args.push("-an".to_string());
        }

        args.extend([
            "-c:v".to_string(),
            self.params.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-crf".to_string(),
            self.params.crf().to_string(),
            "-t".to_string(),
            format!("{:.6}", clip.duration()),
        ]);
        args.push(output.display().to_string());
        args
    }

    /// One ffmpeg input per audio span, starting at input index 1
    fn audio_input_args(&self, audio: &AudioTrack) -> Vec<String> {
        let mut args = Vec::new();
        for span in audio.spans() {
            match span {
                AudioSpan::Source {
                    path,
                    offset,
                    duration,
                } => {
                    args.extend([
                        "-ss".to_string(),
                        format!("{:.6}", offset),
                        "-t".to_string(),
                        format!("{:.6}", duration),
                        "-i".to_string(),
                        path.display().to_string(),
                    ]);
                }
                AudioSpan::Silence { duration } => {
                    args.extend([
                        "-f".to_string(),
                        "lavfi".to_string(),
                        "-t".to_string(),
                        format!("{:.6}", duration),
                        "-i".to_string(),
                        format!(
                            "anullsrc=r={}:cl=stereo",
                            self.params.audio_sample_rate
                        ),
                    ]);
                }
            }
        }
        args
    }

    /// Normalise every span to one layout, pad each to its nominal length, then concatenate
    fn audio_filter(&self, audio: &AudioTrack) -> String {
        let spans = audio.spans();
        let mut filter = String::new();
        for (i, span) in spans.iter().enumerate() {
            filter.push_str(&format!(
                "[{}:a]aformat=sample_rates={}:channel_layouts=stereo,apad=whole_dur={:.6}[a{}];",
                i + 1,
                self.params.audio_sample_rate,
                span.duration(),
                i
            ));
        }
        for i in 0..spans.len() {
            filter.push_str(&format!("[a{}]", i));
        }
        filter.push_str(&format!("concat=n={}:v=0:a=1[aout]", spans.len()));
        filter
    }

    fn run_encoder(&self, clip: &Clip, args: &[String], target: &Path) -> Result<()> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| -> CompositorError {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::ToolUnavailable {
                        tool: self.ffmpeg_path.display().to_string(),
                    }
                    .into()
                } else {
                    CompositorError::sink_write(target, format!("failed to start ffmpeg: {}", e))
                }
            })?;

        // ffmpeg blocks if its stderr pipe fills up, so drain it concurrently
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let feed_result = match child.stdin.take() {
            Some(stdin) => {
                let mut writer = BufWriter::new(stdin);
                clip.frames()
                    .iter()
                    .try_for_each(|frame| writer.write_all(frame.as_raw()))
                    .and_then(|_| writer.flush())
            }
            None => Ok(()),
        };

        let status = child.wait().map_err(|e| {
            CompositorError::sink_write(target, format!("failed to wait for ffmpeg: {}", e))
        })?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(CompositorError::sink_write(
                target,
                format!("ffmpeg exited with {}: {}", status, stderr.trim()),
            ));
        }
        feed_result.map_err(|e| {
            CompositorError::sink_write(target, format!("failed to stream frames to ffmpeg: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_clip;

    #[test]
    fn test_quality_to_crf() {
        let mut params = VideoParams::default();
        params.quality = 100;
        assert_eq!(params.crf(), 0);
        params.quality = 0;
        assert_eq!(params.crf(), 51);
    }

    #[test]
    fn test_encode_args_without_audio() {
        let writer = ClipWriter::new("ffmpeg", VideoParams::default());
        let clip = solid_clip([255, 0, 0], 1.0);
        let args = writer.encode_args(&clip, Path::new("/tmp/out.mp4"));

        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"64x36".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
        assert!(!args.iter().any(|a| a == "-filter_complex"));
    }

    #[test]
    fn test_audio_filter_concatenates_spans() {
        let writer = ClipWriter::new("ffmpeg", VideoParams::default());
        let audio = AudioTrack::from_source("a.mp4", 1.5)
            .then(&AudioTrack::silence(0.5))
            .then(&AudioTrack::from_source("b.mp4", 2.0));
        let clip = solid_clip([0, 0, 0], 4.0).with_audio(audio);

        let args = writer.encode_args(&clip, Path::new("out.mp4"));
        let filter_index = args.iter().position(|a| a == "-filter_complex").unwrap();
        let filter = &args[filter_index + 1];

        assert!(filter.contains("[1:a]"));
        assert!(filter.contains("[3:a]"));
        assert!(filter.ends_with("concat=n=3:v=0:a=1[aout]"));
        assert!(args.iter().any(|a| a.starts_with("anullsrc")));
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.mp4");
        let writer = ClipWriter::new(
            dir.path().join("no-such-ffmpeg"),
            VideoParams::default(),
        );

        let err = writer.write(&solid_clip([1, 2, 3], 0.5), &target).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Media(MediaError::ToolUnavailable { .. })
        ));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
