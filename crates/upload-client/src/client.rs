//! Upload API client.
//!
//! Async HTTP client using `reqwest` with multipart form bodies.

use std::time::Duration;

use diting_protocol::constants::{CHUNK_PATH, FINALIZE_PATH, INIT_PATH, UPLOAD_PREFIX, fields};
use diting_protocol::{
    ChunkResponse, DeleteResponse, ErrorDetail, InitUploadRequest, InitUploadResponse,
    TaskHandle, UploadStatusResponse,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the upload client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Upload API client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the server at `base_url` (e.g. `http://localhost:5023`).
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::with_connect_timeout(base_url, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(base_url: &str, connect_timeout: Duration) -> Result<Self, Error> {
        let parsed =
            reqwest::Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "{base_url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Registers an upload and returns its id.
    pub async fn init_upload(&self, request: &InitUploadRequest) -> Result<InitUploadResponse, Error> {
        let form = request
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        debug!(
            filename = %request.filename,
            file_size = request.file_size,
            total_chunks = request.total_chunks,
            "POST {INIT_PATH}"
        );
        let resp = self.http.post(self.url(INIT_PATH)).multipart(form).send().await?;
        decode(resp).await
    }

    /// Sends one chunk as the `file` part.
    pub async fn upload_chunk(
        &self,
        upload_id: &str,
        index: u32,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<ChunkResponse, Error> {
        let len = data.len();
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text(fields::UPLOAD_ID, upload_id.to_string())
            .text(fields::INDEX, index.to_string())
            .part(fields::FILE, part);
        debug!(upload_id, index, bytes = len, "POST {CHUNK_PATH}");
        let resp = self.http.post(self.url(CHUNK_PATH)).multipart(form).send().await?;
        decode(resp).await
    }

    /// Asks the server to assemble the upload and dispatch its task.
    pub async fn finalize(&self, upload_id: &str) -> Result<TaskHandle, Error> {
        let form = Form::new().text(fields::UPLOAD_ID, upload_id.to_string());
        debug!(upload_id, "POST {FINALIZE_PATH}");
        let resp = self
            .http
            .post(self.url(FINALIZE_PATH))
            .multipart(form)
            .send()
            .await?;
        decode(resp).await
    }

    /// Returns the chunks the server holds for `upload_id`.
    pub async fn status(&self, upload_id: &str) -> Result<UploadStatusResponse, Error> {
        let path = format!("{UPLOAD_PREFIX}/{}/status", encode_id(upload_id));
        debug!(upload_id, "GET {path}");
        let resp = self.http.get(self.url(&path)).send().await?;
        decode(resp).await
    }

    /// Releases a partial upload.
    pub async fn delete(&self, upload_id: &str) -> Result<DeleteResponse, Error> {
        let path = format!("{UPLOAD_PREFIX}/{}", encode_id(upload_id));
        debug!(upload_id, "DELETE {path}");
        let resp = self.http.delete(self.url(&path)).send().await?;
        decode(resp).await
    }
}

fn encode_id(upload_id: &str) -> String {
    utf8_percent_encode(upload_id, NON_ALPHANUMERIC).to_string()
}

/// Decodes a 2xx JSON body, or maps the error body to [`Error::Api`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorDetail>(&body) {
            Ok(detail) => detail.message(),
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => body,
        };
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
