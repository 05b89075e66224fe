//! # Composition
//!
//! Assembles an advertisement from its segments: regenerates flagged segments
//! through the external generator, then folds the selected segments into one
//! clip with the Merge Orchestrator.

pub mod generation;
pub mod merge;

// Re-exports for convenience
pub use generation::{generate_segments, SegmentGenerator};
pub use merge::{
    final_name, MergeOrchestrator, MergeOutcome, MergeReport, MergeRequest, MergeSegment,
    SegmentEntry, SegmentManifest, TransitionRequest,
};
