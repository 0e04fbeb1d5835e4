//! Wire protocol types for the DiTing chunked upload API.
//!
//! The backend exposes four upload operations (init, chunk, finalize,
//! delete) plus a status query used for resuming. Request bodies are
//! multipart forms; this crate defines the form field names, the JSON
//! response bodies, and the client-side observable state shared by the
//! coordinator and its callers.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ChunkResponse, ChunkStatus, DeleteResponse, DeleteStatus, ErrorDetail, InitUploadRequest,
    InitUploadResponse, TaskHandle, UploadStatusResponse,
};
pub use types::{Phase, TaskOptions, UploadProgress, progress_percent};
