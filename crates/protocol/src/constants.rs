//! Endpoint paths and multipart form field names.

/// Registers a new upload session.
pub const INIT_PATH: &str = "/upload/init";

/// Receives one chunk.
pub const CHUNK_PATH: &str = "/upload/chunk";

/// Triggers assembly and task dispatch.
pub const FINALIZE_PATH: &str = "/upload/finalize";

/// Prefix for per-upload routes (`{prefix}/{id}` and `{prefix}/{id}/status`).
pub const UPLOAD_PREFIX: &str = "/upload";

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default task type sent on init.
pub const DEFAULT_TASK_TYPE: &str = "transcribe";

/// Default transcription language sent on init.
pub const DEFAULT_LANGUAGE: &str = "zh";

/// Multipart form field names.
pub mod fields {
    pub const FILENAME: &str = "filename";
    pub const FILE_SIZE: &str = "file_size";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const TASK_TYPE: &str = "task_type";
    pub const USE_UVR: &str = "use_uvr";
    pub const LANGUAGE: &str = "language";
    pub const PROMPT: &str = "prompt";
    pub const OUTPUT_FORMAT: &str = "output_format";
    pub const UPLOAD_ID: &str = "upload_id";
    pub const INDEX: &str = "index";
    pub const FILE: &str = "file";
}
