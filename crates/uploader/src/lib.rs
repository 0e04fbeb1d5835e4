//! Resumable chunked upload coordinator.
//!
//! This crate implements the **client side** of the chunked upload
//! protocol. It has no transport dependency: the caller provides an
//! [`UploadBackend`] implementation that performs the actual HTTP calls.
//!
//! # Pipeline
//!
//! 1. **Init**: register the upload and obtain an upload id (skipped on resume)
//! 2. **Upload**: send chunks strictly in ascending index order, skipping
//!    indices the backend already holds
//! 3. **Finalize**: ask the backend to assemble the file and dispatch the task
//!
//! [`UploadCoordinator::cancel`] may be called at any time from another task.

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod types;

// Re-export primary types for convenience.
pub use backend::{BackendFuture, ChunkRequest, UploadBackend};
pub use coordinator::{ProgressCallback, UploadCoordinator};
pub use error::{BackendError, UploadError};
pub use types::{CoordinatorConfig, ResumeState};
