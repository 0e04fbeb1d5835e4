//! Bridge between the HTTP `Client` and the coordinator's `UploadBackend` trait.

use std::future::Future;

use diting_protocol::{ChunkResponse, InitUploadRequest, InitUploadResponse, TaskHandle};
use diting_upload_client::{Client, Error as ClientError};
use diting_uploader::{BackendError, BackendFuture, ChunkRequest, UploadBackend};
use tokio_util::sync::CancellationToken;

/// Implements `UploadBackend` on top of the upload API client.
///
/// A fired token drops the in-flight request, which closes its connection.
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl UploadBackend for HttpBackend {
    fn init<'a>(
        &'a self,
        request: &'a InitUploadRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, InitUploadResponse> {
        Box::pin(abortable(cancel, self.client.init_upload(request)))
    }

    fn upload_chunk<'a>(
        &'a self,
        chunk: ChunkRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, ChunkResponse> {
        Box::pin(async move {
            let ChunkRequest {
                upload_id,
                index,
                file_name,
                data,
            } = chunk;
            abortable(
                cancel,
                self.client.upload_chunk(&upload_id, index, &file_name, data),
            )
            .await
        })
    }

    fn finalize<'a>(
        &'a self,
        upload_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a, TaskHandle> {
        Box::pin(abortable(cancel, self.client.finalize(upload_id)))
    }

    fn delete<'a>(&'a self, upload_id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let resp = self.client.delete(upload_id).await.map_err(to_backend_error)?;
            tracing::debug!(upload_id, status = ?resp.status, "delete acknowledged");
            Ok(())
        })
    }
}

async fn abortable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, BackendError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::Aborted),
        res = fut => res.map_err(to_backend_error),
    }
}

fn to_backend_error(e: ClientError) -> BackendError {
    match e {
        ClientError::Api { status, message } => BackendError::Status { status, message },
        ClientError::Http(e) => BackendError::Transport(e.to_string()),
        ClientError::Json(e) => BackendError::Protocol(e.to_string()),
        ClientError::InvalidUrl(m) => BackendError::Transport(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diting_protocol::TaskOptions;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[test]
    fn api_errors_keep_status() {
        let err = to_backend_error(ClientError::Api {
            status: 404,
            message: "Upload not found".into(),
        });
        assert_eq!(
            err,
            BackendError::Status {
                status: 404,
                message: "Upload not found".into()
            }
        );
    }

    #[test]
    fn json_errors_are_protocol_errors() {
        let json_err = serde_json::from_str::<InitUploadResponse>("{}").unwrap_err();
        assert!(matches!(
            to_backend_error(ClientError::Json(json_err)),
            BackendError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn cancel_aborts_hanging_request() {
        // Accepts the connection but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let backend = HttpBackend::new(Client::new(&url).unwrap());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let request = InitUploadRequest {
            filename: "talk.mp4".into(),
            file_size: 1,
            total_chunks: 1,
            options: TaskOptions::default(),
        };
        let err = backend.init(&request, &cancel).await.unwrap_err();
        assert_eq!(err, BackendError::Aborted);

        server.abort();
    }
}
