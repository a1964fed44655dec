//! Core pipeline orchestration and ranking logic for submerge.
//!
//! This crate ties together decoding, parsing, filtering, deduplication,
//! optional reachability probing and scoring into one run (`run_pipeline`).

pub mod dedup;
pub mod filter;
pub mod pipeline;
pub mod scoring;

pub use dedup::{DedupOutcome, dedup};
pub use filter::{FilterOutcome, apply_filter};
pub use pipeline::{
    PipelineOutput, ProgressReporter, RunStats, SilentProgress, SourcePayload, process_payloads,
    run_pipeline,
};
pub use scoring::{rank, score, split_top};
