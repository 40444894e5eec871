//! Centralized error types for mbox-pdf-extract.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the extraction library.
///
/// Header decoding never fails, and missing headers or payloads fall back
/// locally, so everything here is a filesystem or configuration failure.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The MBOX archive does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// A configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, ExtractError>`.
pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
