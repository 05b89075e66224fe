//! Upstream segment generation.
//!
//! Segments are produced by an external generative service. Every segment
//! flagged for regeneration is requested concurrently, bounded by a worker
//! limit, and merging only starts once all of them are back.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::composition::merge::{SegmentEntry, SegmentManifest};
use crate::error::{CompositorError, GenerationError, Result};

/// The external service that renders a segment to a video file
#[async_trait]
pub trait SegmentGenerator: Send + Sync {
    /// Produce a fresh take of segment `index` and return the path of the new video
    async fn generate(&self, index: u32, segment: &SegmentEntry) -> Result<PathBuf>;
}

/// Regenerate every segment of `manifest` flagged `regenerate`, at most
/// `max_workers` at a time.
///
/// Returns the manifest with regenerated entries pointing at their new videos
/// and their flag cleared; other entries are passed through unchanged. The
/// first failure cancels the outstanding work and is returned.
pub async fn generate_segments<G>(generator: Arc<G>, manifest: SegmentManifest, max_workers: usize) -> Result<SegmentManifest>
where
    G: SegmentGenerator + ?Sized + 'static,
{
    let pending: Vec<usize> = manifest
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.regenerate)
        .map(|(i, _)| i)
        .collect();
    if pending.is_empty() {
        debug!("No segments flagged for regeneration");
        return Ok(manifest);
    }

    info!("🎥 Generating {} segment(s) with up to {} worker(s)", pending.len(), max_workers);
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    for index in pending {
        let generator = Arc::clone(&generator);
        let permits = Arc::clone(&permits);
        let entry = manifest.segments[index].clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|e| GenerationError::WorkerPanicked {
                reason: e.to_string(),
            })?;
            debug!("Generating segment {}", index);
            let path = generator.generate(index as u32, &entry).await.map_err(|e| match e {
                CompositorError::Generation(inner) => CompositorError::Generation(inner),
                other => GenerationError::SegmentFailed {
                    segment: index as u32,
                    reason: other.to_string(),
                }
                .into(),
            })?;
            Ok::<_, CompositorError>((index, path))
        });
    }

    let mut manifest = manifest;
    while let Some(joined) = tasks.join_next().await {
        let (index, path) = joined.map_err(|e| GenerationError::WorkerPanicked { reason: e.to_string() })??;
        info!("   Segment {} ready: {:?}", index, path);
        let entry = &mut manifest.segments[index];
        entry.source_path = path;
        entry.regenerate = false;
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Generator that records its peak concurrency and fails on request
    #[derive(Default)]
    struct FakeGenerator {
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl SegmentGenerator for FakeGenerator {
        async fn generate(&self, index: u32, segment: &SegmentEntry) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Later segments finish first
            tokio::time::sleep(Duration::from_millis(40 - index as u64 * 5)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(index) {
                return Err(CompositorError::generic("quota exceeded"));
            }
            Ok(PathBuf::from(format!("fresh_{}_{}", index, segment.source_path.display())))
        }
    }

    fn manifest(flags: &[bool]) -> SegmentManifest {
        SegmentManifest {
            segments: flags
                .iter()
                .enumerate()
                .map(|(i, &regenerate)| SegmentEntry {
                    source_path: PathBuf::from(format!("seg{}.mp4", i)),
                    transition: None,
                    selected: true,
                    regenerate,
                    prompt: Some(format!("shot {}", i)),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_only_flagged_segments_are_generated_in_order() {
        let generator = Arc::new(FakeGenerator::default());
        let result = generate_segments(Arc::clone(&generator), manifest(&[true, false, true, true]), 2)
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert!(generator.peak.load(Ordering::SeqCst) <= 2);

        let paths: Vec<_> = result.segments.iter().map(|s| s.source_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("fresh_0_seg0.mp4"),
                PathBuf::from("seg1.mp4"),
                PathBuf::from("fresh_2_seg2.mp4"),
                PathBuf::from("fresh_3_seg3.mp4"),
            ]
        );
        assert!(result.segments.iter().all(|s| !s.regenerate));
    }

    #[tokio::test]
    async fn test_nothing_flagged_skips_the_generator() {
        let generator = Arc::new(FakeGenerator::default());
        let input = manifest(&[false, false]);
        let result = generate_segments(Arc::clone(&generator), input.clone(), 4).await.unwrap();
        assert_eq!(result, input);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_per_segment() {
        let generator = Arc::new(FakeGenerator {
            fail_on: Some(1),
            ..FakeGenerator::default()
        });
        let err = generate_segments(generator, manifest(&[true, true, true]), 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Generation(GenerationError::SegmentFailed { segment: 1, .. })
        ));
        assert!(err.is_recoverable());
    }
}
