//! Error types for the compliance-check core
//!
//! Internal operations (file reads, notifier setup, text generation) return
//! [`YakkiError`]. The public check path and the recovery pipeline are total
//! and never surface these to their callers; they are logged instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum YakkiError {
    /// File-system error with the path that caused it
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text-generation collaborator failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// The text-generation collaborator did not answer in time
    #[error("Operation timed out after {timeout_seconds}s: {context}")]
    Timeout {
        timeout_seconds: u64,
        context: String,
    },

    /// File change notifier could not be set up
    #[error("Watch error: {0}")]
    Watch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl YakkiError {
    /// Wrap an I/O error with the path it happened at
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        YakkiError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, YakkiError>;

impl From<String> for YakkiError {
    fn from(s: String) -> Self {
        YakkiError::Other(s)
    }
}

impl From<&str> for YakkiError {
    fn from(s: &str) -> Self {
        YakkiError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for YakkiError {
    fn from(e: serde_json::Error) -> Self {
        YakkiError::Serialization(e.to_string())
    }
}

impl From<notify::Error> for YakkiError {
    fn from(e: notify::Error) -> Self {
        YakkiError::Watch(e.to_string())
    }
}
