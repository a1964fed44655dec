//! Shared types, error model, and configuration for submerge.
//!
//! This crate is the foundation depended on by all other submerge crates.
//! It provides:
//! - [`SubmergeError`]: the unified error type
//! - Domain types ([`NodeRecord`], [`Protocol`], [`Fingerprint`], [`RunId`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FilterConfig, OutputConfig, PipelineConfig, RunSection, ScoringConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SubmergeError};
pub use types::{Fingerprint, NodeRecord, Protocol, RunId};
