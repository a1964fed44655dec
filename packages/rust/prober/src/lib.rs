//! Concurrent TCP reachability prober.
//!
//! This crate provides:
//! - [`engine`]: semaphore-bounded probing of node endpoints
//! - [`ProbeOutcome`] / [`ProbeSummary`]: per-node and aggregate results
//!
//! A probe is a bare TCP connect: no protocol handshake is attempted.

pub mod engine;

pub use engine::{ProbeConfig, ProbeOutcome, ProbeProgress, ProbeSummary, Prober, SilentProbeProgress};
