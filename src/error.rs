//! Service-level error taxonomy.
//!
//! Pipeline and index errors surface here unchanged; only the front-ends
//! transform them for presentation.

use thiserror::Error;

use crate::audio::wav::WavError;
use crate::fingerprint::spectrogram::SpectrogramError;
use crate::storage::StorageError;

/// Errors surfaced by ingest and query operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing fields, malformed hashes, or otherwise unusable request input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The external transcoder failed to produce a canonical WAV.
    #[error("Audio decoder failed: {0}")]
    DecoderFailed(String),
    /// The WAV reader rejected the decoded file.
    #[error("WAV read failed: {0}")]
    Reader(#[from] WavError),
    /// The analysis pipeline rejected its input.
    #[error("Analysis failed: {0}")]
    Pipeline(#[from] SpectrogramError),
    /// The fingerprint index failed.
    #[error("Index operation failed: {0}")]
    Index(StorageError),
    /// A referenced song does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The operation was cancelled or hit its deadline.
    #[error("Operation cancelled")]
    Cancelled,
    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Index(other),
        }
    }
}
