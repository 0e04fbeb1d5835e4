//! Chunked transfer primitives with resume support and progress tracking.
//!
//! Everything here is transport-agnostic: the upload coordinator drives
//! an [`UploadSession`] through its phases, reads bytes from a
//! [`ChunkSource`] according to a [`ChunkPlan`], and feeds per-chunk
//! timings into a [`SpeedEstimator`].

mod chunked;
mod progress;
mod types;

pub use chunked::{ChunkPlan, ChunkSource, FileSource, MemorySource, SourceFuture};
pub use progress::{
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_SPEED_WINDOW, ProgressThrottle, SpeedEstimator,
    SpeedSample, format_bytes, format_eta, format_speed,
};
pub use types::{ChunkTransfer, UploadSession};

pub use diting_protocol::constants::DEFAULT_CHUNK_SIZE;
use diting_protocol::Phase;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("file needs {0} chunks, more than the protocol allows")]
    TooManyChunks(u64),

    #[error("chunk index {index} out of range (total {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("upload id already assigned: {0}")]
    UploadIdAssigned(String),

    #[error("no chunk plan: session not started")]
    NotStarted,
}
