//! Error types for submerge.
//!
//! Library crates use [`SubmergeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all submerge operations.
#[derive(Debug, thiserror::Error)]
pub enum SubmergeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a subscription source.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid config value, bad output path, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No source yielded a single usable node. Nothing may be written.
    #[error("no usable nodes: {sources} source(s) produced zero parseable nodes")]
    NoUsableNodes { sources: usize },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SubmergeError>;

impl SubmergeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
