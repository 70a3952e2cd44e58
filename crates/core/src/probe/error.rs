//! Error types for the probe module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors a probe provider can report for one item.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider observed its context being cancelled.
    #[error("Probe cancelled")]
    Cancelled,

    /// The item has no usable path.
    #[error("Item has no path")]
    MissingPath,

    /// The pointer file does not contain a stream address.
    #[error("No stream URL in {path}")]
    EmptyPointer { path: PathBuf },

    /// ffprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// The probe ran but failed.
    #[error("Probe failed: {reason}")]
    ProbeFailed { reason: String },

    /// The probe found no media streams.
    #[error("No media streams found")]
    NoStreams,

    /// Failed to parse the probe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error while reading the pointer or persisting results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }
}

/// Errors that abort a whole batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The caller cancelled the batch. No partial result is returned.
    #[error("Probe batch cancelled")]
    Cancelled,
}
