//! Backend collaborator trait.
//!
//! `UploadBackend` is implemented by the application on top of its HTTP
//! client. Using a trait keeps the coordinator decoupled from transport
//! and testable with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use diting_protocol::{ChunkResponse, InitUploadRequest, InitUploadResponse, TaskHandle};
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;

/// Boxed future returned by backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// One chunk ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub upload_id: String,
    pub index: u32,
    /// Source file name, sent as the multipart file name.
    pub file_name: String,
    pub data: Vec<u8>,
}

/// The four backend operations of the upload protocol.
///
/// Calls taking a `cancel` token should stop work once it fires; the
/// coordinator discards any result observed after cancellation.
pub trait UploadBackend: Send + Sync {
    /// Registers an upload and returns its id.
    fn init<'a>(
        &'a self,
        request: &'a InitUploadRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, InitUploadResponse>;

    /// Sends one chunk. Must be safe to repeat for the same index.
    fn upload_chunk<'a>(
        &'a self,
        chunk: ChunkRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, ChunkResponse>;

    /// Signals that all chunks were sent and returns the created task.
    fn finalize<'a>(
        &'a self,
        upload_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, TaskHandle>;

    /// Releases a partial upload. Advisory.
    fn delete<'a>(&'a self, upload_id: &'a str) -> BackendFuture<'a, ()>;
}

impl<T: UploadBackend + ?Sized> UploadBackend for Arc<T> {
    fn init<'a>(
        &'a self,
        request: &'a InitUploadRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, InitUploadResponse> {
        (**self).init(request, cancel)
    }

    fn upload_chunk<'a>(
        &'a self,
        chunk: ChunkRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, ChunkResponse> {
        (**self).upload_chunk(chunk, cancel)
    }

    fn finalize<'a>(
        &'a self,
        upload_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, TaskHandle> {
        (**self).finalize(upload_id, cancel)
    }

    fn delete<'a>(&'a self, upload_id: &'a str) -> BackendFuture<'a, ()> {
        (**self).delete(upload_id)
    }
}
