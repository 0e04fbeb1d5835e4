//! Upload error types.

use diting_transfer::TransferError;

/// Failure reported by an [`UploadBackend`](crate::UploadBackend) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("request aborted")]
    Aborted,
}

/// Errors produced by the upload coordinator.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file is empty")]
    EmptyFile,

    #[error("invalid resume state: {0}")]
    InvalidResume(String),

    #[error("coordinator is {0}, not idle")]
    NotIdle(diting_protocol::Phase),

    #[error("init failed: {0}")]
    Init(BackendError),

    #[error("chunk {index} failed: {source}")]
    Chunk { index: u32, source: BackendError },

    #[error("failed to read chunk {index}: {source}")]
    Read { index: u32, source: TransferError },

    #[error("finalize failed: {0}")]
    Finalize(BackendError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` for the quiet cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Index of the chunk that failed, if the failure was a chunk failure.
    pub fn failed_chunk(&self) -> Option<u32> {
        match self {
            UploadError::Chunk { index, .. } | UploadError::Read { index, .. } => Some(*index),
            _ => None,
        }
    }
}
