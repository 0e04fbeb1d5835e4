fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use diting_protocol::{
        ChunkResponse, ChunkStatus, DeleteResponse, DeleteStatus, ErrorDetail, InitUploadRequest,
        InitUploadResponse, Phase, TaskHandle, UploadProgress, UploadStatusResponse,
    };
    use diting_uploader::ResumeState;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The server may send `65` where Rust serializes an `f64` as `65.0`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  rust:   {reserialized}"
        );
        parsed
    }

    // --- Requests ---

    #[test]
    fn fixture_init_upload_request() {
        let req: InitUploadRequest = roundtrip_test("init_upload_request.json");
        assert_eq!(req.total_chunks, 3);
        assert_eq!(req.options.prompt.as_deref(), Some("技术讲座"));
        let fields = req.form_fields();
        assert!(fields.contains(&("output_format", "srt".to_string())));
    }

    // --- Responses ---

    #[test]
    fn fixture_init_upload_response() {
        let resp: InitUploadResponse = roundtrip_test("init_upload_response.json");
        assert_eq!(resp.upload_id.len(), 32);
    }

    #[test]
    fn fixture_chunk_success() {
        let resp: ChunkResponse = roundtrip_test("chunk_success.json");
        assert_eq!(resp.status, ChunkStatus::Success);
        assert_eq!(resp.received, Some(2));
    }

    #[test]
    fn fixture_chunk_already_received() {
        let resp: ChunkResponse = roundtrip_test("chunk_already_received.json");
        assert_eq!(resp.status, ChunkStatus::AlreadyReceived);
        assert!(resp.received.is_none());
    }

    #[test]
    fn fixture_finalize_pending() {
        let task: TaskHandle = roundtrip_test("finalize_pending.json");
        assert_eq!(task.id, Some(42));
        assert_eq!(task.extra.len(), 1);
    }

    #[test]
    fn fixture_finalize_bookmarked() {
        let task: TaskHandle = roundtrip_test("finalize_bookmarked.json");
        assert!(task.id.is_none());
        assert_eq!(task.status, "bookmarked");
    }

    #[test]
    fn fixture_finalize_ephemeral() {
        let task: TaskHandle = roundtrip_test("finalize_ephemeral.json");
        assert!(task.id.is_some_and(|id| id < 0));
    }

    #[test]
    fn fixture_upload_status() {
        let status: UploadStatusResponse = roundtrip_test("upload_status.json");
        // The status body seeds a resume directly.
        let resume = ResumeState::new(status.upload_id, status.received_chunks);
        assert_eq!(resume.received_chunks.len(), 2);
    }

    #[test]
    fn fixture_delete_responses() {
        let resp: DeleteResponse = roundtrip_test("delete_cancelled.json");
        assert_eq!(resp.status, DeleteStatus::Cancelled);
        let resp: DeleteResponse = roundtrip_test("delete_not_found.json");
        assert_eq!(resp.status, DeleteStatus::NotFound);
    }

    #[test]
    fn fixture_error_bodies() {
        let err: ErrorDetail = roundtrip_test("error_detail.json");
        assert_eq!(err.message(), "Missing chunks. Received 2/3");
        let err: ErrorDetail = roundtrip_test("error_validation.json");
        assert_eq!(err.message(), "field required");
    }

    // --- Client-side state ---

    #[test]
    fn fixture_upload_progress() {
        let p: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(p.phase, Phase::Uploading);
        assert!(p.error.is_none());
    }
}
