//! Audio pass-through.
//!
//! Audio is never decoded by the compositor. A clip carries an [`AudioTrack`]:
//! an ordered list of spans that either point into a source file or stand
//! for silence. Transitions splice tracks, and the writer hands the spans to
//! ffmpeg when the final file is muxed.

use std::path::PathBuf;

/// Spans shorter than this are dropped while splicing
const MIN_SPAN_SECONDS: f64 = 1e-4;

/// One contiguous piece of an audio track
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSpan {
    /// `duration` seconds of the source's audio starting at `offset`
    Source {
        path: PathBuf,
        offset: f64,
        duration: f64,
    },
    /// `duration` seconds of silence
    Silence { duration: f64 },
}

impl AudioSpan {
    pub fn duration(&self) -> f64 {
        match self {
            AudioSpan::Source { duration, .. } | AudioSpan::Silence { duration } => *duration,
        }
    }

    /// The part of this span covering `[start, start + length)` relative to the span
    fn section(&self, start: f64, length: f64) -> AudioSpan {
        match self {
            AudioSpan::Source { path, offset, .. } => AudioSpan::Source {
                path: path.clone(),
                offset: offset + start,
                duration: length,
            },
            AudioSpan::Silence { .. } => AudioSpan::Silence { duration: length },
        }
    }
}

/// An ordered list of audio spans that plays alongside a clip's frames
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioTrack {
    spans: Vec<AudioSpan>,
}

impl AudioTrack {
    /// A silent track of the given length
    pub fn silence(duration: f64) -> Self {
        let mut track = Self::default();
        track.push(AudioSpan::Silence { duration });
        track
    }

    /// The audio stream of `path` from `0` to `duration`
    pub fn from_source<P: Into<PathBuf>>(path: P, duration: f64) -> Self {
        let mut track = Self::default();
        track.push(AudioSpan::Source {
            path: path.into(),
            offset: 0.0,
            duration,
        });
        track
    }

    pub fn spans(&self) -> &[AudioSpan] {
        &self.spans
    }

    pub fn duration(&self) -> f64 {
        self.spans.iter().map(AudioSpan::duration).sum()
    }

    /// True when at least one span refers to real audio
    pub fn has_audio(&self) -> bool {
        self.spans
            .iter()
            .any(|span| matches!(span, AudioSpan::Source { .. }))
    }

    fn push(&mut self, span: AudioSpan) {
        if span.duration() < MIN_SPAN_SECONDS {
            return;
        }
        // Adjacent silences collapse into one
        if let (Some(AudioSpan::Silence { duration: last }), AudioSpan::Silence { duration }) =
            (self.spans.last_mut(), &span)
        {
            *last += duration;
            return;
        }
        self.spans.push(span);
    }

    /// The part of the track covering `[start, start + length)`.
    ///
    /// A section reaching past the end of the track is padded with silence.
    pub fn section(&self, start: f64, length: f64) -> AudioTrack {
        let end = start + length;
        let mut result = AudioTrack::default();
        let mut cursor = 0.0;

        for span in &self.spans {
            let span_start = cursor;
            let span_end = cursor + span.duration();
            cursor = span_end;

            let from = span_start.max(start);
            let to = span_end.min(end);
            if to > from {
                result.push(span.section(from - span_start, to - from));
            }
        }

        let covered = result.duration();
        if covered + MIN_SPAN_SECONDS < length {
            result.push(AudioSpan::Silence {
                duration: length - covered,
            });
        }
        result
    }

    /// The first `length` seconds
    pub fn truncated(&self, length: f64) -> AudioTrack {
        self.section(0.0, length)
    }

    /// Everything after the first `skip` seconds
    pub fn skipping(&self, skip: f64) -> AudioTrack {
        let total = self.duration();
        self.section(skip, (total - skip).max(0.0))
    }

    /// This track followed by `other`
    pub fn then(&self, other: &AudioTrack) -> AudioTrack {
        let mut result = self.clone();
        for span in &other.spans {
            result.push(span.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_has_no_audio() {
        let track = AudioTrack::silence(2.0);
        assert!(!track.has_audio());
        assert!((track.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_then_concatenate() {
        let a = AudioTrack::from_source("a.mp4", 4.0);
        let b = AudioTrack::from_source("b.mp4", 3.0);
        let spliced = a.truncated(2.5).then(&b);

        assert_eq!(spliced.spans().len(), 2);
        assert!((spliced.duration() - 5.5).abs() < 1e-9);
        assert_eq!(
            spliced.spans()[0],
            AudioSpan::Source {
                path: "a.mp4".into(),
                offset: 0.0,
                duration: 2.5
            }
        );
    }

    #[test]
    fn test_skipping_offsets_into_source() {
        let track = AudioTrack::from_source("a.mp4", 4.0).skipping(1.5);
        assert_eq!(
            track.spans(),
            &[AudioSpan::Source {
                path: "a.mp4".into(),
                offset: 1.5,
                duration: 2.5
            }]
        );
    }

    #[test]
    fn test_section_across_spans_and_padding() {
        let track = AudioTrack::from_source("a.mp4", 1.0)
            .then(&AudioTrack::silence(1.0))
            .then(&AudioTrack::from_source("b.mp4", 1.0));

        let middle = track.section(0.5, 2.0);
        assert_eq!(middle.spans().len(), 3);
        assert!((middle.duration() - 2.0).abs() < 1e-9);

        let padded = AudioTrack::from_source("a.mp4", 1.0).section(0.0, 2.0);
        assert!((padded.duration() - 2.0).abs() < 1e-9);
        assert!(matches!(padded.spans()[1], AudioSpan::Silence { .. }));
    }

    #[test]
    fn test_adjacent_silences_merge() {
        let track = AudioTrack::silence(1.0).then(&AudioTrack::silence(2.0));
        assert_eq!(track.spans().len(), 1);
    }
}
