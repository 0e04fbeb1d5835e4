use serde::{Deserialize, Serialize};

use crate::constants::fields;
use crate::types::TaskOptions;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Registers a new upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub file_size: u64,
    pub total_chunks: u32,
    #[serde(flatten)]
    pub options: TaskOptions,
}

impl InitUploadRequest {
    /// Returns the multipart text fields for this request, in wire order.
    ///
    /// `output_format` is omitted when unset; `prompt` is sent empty.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            (fields::FILENAME, self.filename.clone()),
            (fields::FILE_SIZE, self.file_size.to_string()),
            (fields::TOTAL_CHUNKS, self.total_chunks.to_string()),
            (fields::TASK_TYPE, self.options.task_type.clone()),
            (fields::USE_UVR, self.options.use_uvr.to_string()),
            (fields::LANGUAGE, self.options.language.clone()),
            (
                fields::PROMPT,
                self.options.prompt.clone().unwrap_or_default(),
            ),
        ];
        if let Some(fmt) = &self.options.output_format {
            out.push((fields::OUTPUT_FORMAT, fmt.clone()));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response to init.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub upload_id: String,
}

/// Outcome of a chunk upload. Both variants mean the backend holds the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Success,
    AlreadyReceived,
}

/// Response to a chunk upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub status: ChunkStatus,
    pub index: u32,
    /// Number of distinct chunks the backend holds (absent on `already_received`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<u32>,
}

/// Processing task created by finalize.
///
/// `id` is `None` for bookmark-only tasks and negative for ephemeral
/// cache tasks. Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response to the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub received_chunks: Vec<u32>,
    pub total_chunks: u32,
}

/// Cleanup outcome of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Cancelled,
    NotFound,
}

/// Response to delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: DeleteStatus,
}

/// Error body returned with non-2xx statuses.
///
/// `detail` is a string for handler errors and a list of objects for
/// form validation errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Returns a single-line human readable message.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_init() -> InitUploadRequest {
        InitUploadRequest {
            filename: "talk.mp4".into(),
            file_size: 26_214_400,
            total_chunks: 3,
            options: TaskOptions::default(),
        }
    }

    #[test]
    fn init_form_fields_skip_missing_output_format() {
        let fields = sample_init().form_fields();
        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec![
                "filename",
                "file_size",
                "total_chunks",
                "task_type",
                "use_uvr",
                "language",
                "prompt"
            ]
        );
        assert!(fields.contains(&("use_uvr", "false".into())));
        assert!(fields.contains(&("prompt", String::new())));
    }

    #[test]
    fn init_form_fields_include_output_format() {
        let mut req = sample_init();
        req.options.output_format = Some("srt".into());
        req.options.use_uvr = true;
        let fields = req.form_fields();
        assert!(fields.contains(&("output_format", "srt".into())));
        assert!(fields.contains(&("use_uvr", "true".into())));
    }

    #[test]
    fn chunk_response_already_received_has_no_count() {
        let resp: ChunkResponse =
            serde_json::from_str(r#"{"status":"already_received","index":4}"#).unwrap();
        assert_eq!(resp.status, ChunkStatus::AlreadyReceived);
        assert_eq!(resp.index, 4);
        assert!(resp.received.is_none());
    }

    #[test]
    fn task_handle_keeps_extra_fields() {
        let handle: TaskHandle = serde_json::from_str(
            r#"{"id":null,"status":"bookmarked","message":"Video bookmarked","source_id":"abc"}"#,
        )
        .unwrap();
        assert!(handle.id.is_none());
        assert_eq!(handle.status, "bookmarked");
        assert_eq!(handle.extra.get("source_id").unwrap(), "abc");
    }

    #[test]
    fn error_detail_string_and_list() {
        let plain: ErrorDetail =
            serde_json::from_str(r#"{"detail":"Upload session not found"}"#).unwrap();
        assert_eq!(plain.message(), "Upload session not found");

        let list: ErrorDetail = serde_json::from_str(
            r#"{"detail":[{"loc":["body","index"],"msg":"field required"},{"msg":"bad upload_id"}]}"#,
        )
        .unwrap();
        assert_eq!(list.message(), "field required; bad upload_id");
    }
}
