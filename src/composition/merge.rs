use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, MergeConfig},
    error::{CompositorError, ConfigError, ParameterError, Result},
    transitions::{apply_transition, TransitionDefaults, TransitionKind, TransitionSpec},
    video::{Clip, FrameSource, WrittenClip},
};

/// Timestamp layout of the final file name
const FINAL_NAME_TIME_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

/// One segment of an advertisement and how it leads into the next
#[derive(Debug, Clone)]
pub struct MergeSegment {
    pub clip: Clip,
    /// Join into the following segment; a plain cut when `None`. Ignored on the last segment.
    pub transition: Option<TransitionSpec>,
}

impl MergeSegment {
    pub fn new(clip: Clip, transition: Option<TransitionSpec>) -> Self {
        Self { clip, transition }
    }
}

/// Ordered segments to fold into one clip
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    pub segments: Vec<MergeSegment>,
}

impl MergeRequest {
    pub fn new(segments: Vec<MergeSegment>) -> Self {
        Self { segments }
    }
}

/// Result of a merge
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No segments were given, so nothing was written
    NothingToMerge,
    Merged(MergeReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// The final video
    pub output: WrittenClip,
    /// Number of pairwise transitions applied
    pub steps: usize,
    /// Step outputs, when intermediates are kept
    pub intermediates: Vec<WrittenClip>,
}

/// Folds a list of segments into one clip by repeatedly joining pairs.
///
/// The pending clips live on a stack loaded in reverse order, so popping
/// yields them front to back:
///
/// ```text
/// stack (top on the right)      step
/// [s3, s2, s1]                  pop s1, pop s2, join with s1's transition
/// [s3, s1+s2]                   pop s1+s2, pop s3, join with s2's transition
/// [s1+s2+s3]                    one clip left: write it
/// ```
///
/// The transition stored on segment `i` therefore always governs the join
/// between segment `i` and segment `i + 1`.
pub struct MergeOrchestrator {
    config: MergeConfig,
    defaults: TransitionDefaults,
}

impl MergeOrchestrator {
    pub fn new(config: &Config) -> Self {
        Self::with_settings(config.merge.clone(), config.transitions.clone())
    }

    pub fn with_settings(config: MergeConfig, defaults: TransitionDefaults) -> Self {
        Self { config, defaults }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Fold `request` into one clip and write it under the configured output
    /// directory with a timestamped name.
    pub fn merge<S: FrameSource + ?Sized>(&self, source: &S, request: MergeRequest) -> Result<MergeOutcome> {
        self.merge_at(source, request, Local::now())
    }

    /// [`merge`](Self::merge) with the clock reading used for the final file name
    pub fn merge_at<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        request: MergeRequest,
        now: DateTime<Local>,
    ) -> Result<MergeOutcome> {
        info!("🎬 Merging {} segment(s)", request.segments.len());

        let mut intermediates = Vec::new();
        let keep = self.config.keep_intermediates;
        let output_dir = self.config.output_dir.clone();

        let folded = self.reduce(request.segments, |step, clip| {
            if keep {
                let path = output_dir.join(format!("video_{}_{}.mp4", step, step + 1));
                debug!("Writing intermediate {:?}", path);
                intermediates.push(source.write_clip(clip, &path)?);
            }
            Ok(())
        })?;

        let Some((clip, steps)) = folded else {
            info!("No segments to merge");
            return Ok(MergeOutcome::NothingToMerge);
        };

        let path = self.final_path(now);
        info!("💾 Writing final video: {:?} ({:.2}s)", path, clip.duration());
        let output = source.write_clip(&clip, &path)?;

        info!("🎉 Merge complete after {} transition(s)", steps);
        Ok(MergeOutcome::Merged(MergeReport {
            output,
            steps,
            intermediates,
        }))
    }

    /// Load the selected segments of `manifest` from `source` and merge them
    pub fn merge_manifest<S: FrameSource + ?Sized>(&self, source: &S, manifest: &SegmentManifest) -> Result<MergeOutcome> {
        let request = self.load_manifest(source, manifest)?;
        self.merge(source, request)
    }

    /// Resolve every selected manifest entry into a clip and a transition
    pub fn load_manifest<S: FrameSource + ?Sized>(&self, source: &S, manifest: &SegmentManifest) -> Result<MergeRequest> {
        let mut segments = Vec::new();
        for (index, entry) in manifest.segments.iter().enumerate() {
            if !entry.selected {
                debug!("Skipping unselected segment {}", index);
                continue;
            }
            let transition = entry
                .transition
                .as_ref()
                .map(|t| self.resolve_transition(t))
                .transpose()?;
            let clip = source.open_clip(&entry.source_path)?;
            debug!(
                "Segment {}: {:?} ({:.2}s), transition {:?}",
                index,
                entry.source_path,
                clip.duration(),
                transition.as_ref().map(TransitionSpec::kind)
            );
            segments.push(MergeSegment::new(clip, transition));
        }
        Ok(MergeRequest::new(segments))
    }

    /// Turn a requested transition into a spec, layering its parameters over the configured defaults
    pub fn resolve_transition(&self, request: &TransitionRequest) -> Result<TransitionSpec> {
        match TransitionSpec::resolve(&request.kind, &request.params, &self.defaults) {
            Err(CompositorError::UnsupportedTransition { name }) if self.config.fallback_to_concatenate => {
                warn!("Unknown transition '{}', falling back to a plain cut", name);
                Ok(TransitionSpec::from_defaults(TransitionKind::Concatenate, &self.defaults))
            }
            other => other,
        }
    }

    /// Fold `segments` pairwise, calling `on_step` with each step's output.
    ///
    /// Returns the final clip and the number of steps, or `None` for an empty list.
    pub fn reduce<F>(&self, segments: Vec<MergeSegment>, mut on_step: F) -> Result<Option<(Clip, usize)>>
    where
        F: FnMut(usize, &Clip) -> Result<()>,
    {
        let Some(target_size) = segments.first().map(|s| s.clip.size()) else {
            return Ok(None);
        };

        // Back of the deque is the top of the stack
        let mut stack: VecDeque<MergeSegment> = segments.into_iter().rev().collect();
        let mut steps = 0;

        while stack.len() > 1 {
            let (Some(head), Some(next)) = (stack.pop_back(), stack.pop_back()) else {
                break;
            };
            let spec = head.transition.unwrap_or_default();
            let incoming = conform(next.clip, target_size)?;

            info!("🔀 Step {}: {} ({:.2}s + {:.2}s)", steps + 1, spec.kind(), head.clip.duration(), incoming.duration());
            let joined = apply_transition(&head.clip, &incoming, &spec)?;
            on_step(steps, &joined)?;
            steps += 1;

            stack.push_back(MergeSegment::new(joined, next.transition));
        }

        Ok(stack.pop_back().map(|last| (last.clip, steps)))
    }

    /// Output path of the final video for a merge finished at `now`
    pub fn final_path(&self, now: DateTime<Local>) -> PathBuf {
        self.config
            .output_dir
            .join(final_name(&self.config.final_name_prefix, now))
    }
}

/// `{prefix}_{dd-mm-YYYY_HH-MM-SS}.mp4`
pub fn final_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.mp4", prefix, now.format(FINAL_NAME_TIME_FORMAT))
}

/// Resize `clip` to `size` when it differs
fn conform(clip: Clip, size: (u32, u32)) -> Result<Clip> {
    if clip.size() == size {
        return Ok(clip);
    }
    warn!(
        "Segment is {}x{}, resizing to {}x{}",
        clip.width(),
        clip.height(),
        size.0,
        size.1
    );
    clip.resized(size.0, size.1)
}

/// A transition as written in a manifest: a `type` tag plus parameter overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl TransitionRequest {
    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }
}

fn selected_by_default() -> bool {
    true
}

/// One entry of a segment manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentEntry {
    pub source_path: PathBuf,
    #[serde(default)]
    pub transition: Option<TransitionRequest>,
    /// Unselected segments are left out of the merge
    #[serde(default = "selected_by_default")]
    pub selected: bool,
    /// Ask the generator for a fresh take of this segment before merging
    #[serde(default)]
    pub regenerate: bool,
    /// Prompt handed to the generator
    #[serde(default)]
    pub prompt: Option<String>,
}

/// The segments of an advertisement, in playback order
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SegmentManifest {
    pub segments: Vec<SegmentEntry>,
}

impl SegmentManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ParameterError::Malformed {
                context: "segment manifest".to_string(),
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

    pub fn selected(&self) -> impl Iterator<Item = &SegmentEntry> {
        self.segments.iter().filter(|s| s.selected)
    }
}
