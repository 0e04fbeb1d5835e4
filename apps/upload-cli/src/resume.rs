//! On-disk resume records.
//!
//! One JSON file per `(file name, size, chunk size)` under the state
//! directory, named by the SHA-256 of that triple.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use diting_uploader::ResumeState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies which upload a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKey {
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
}

impl UploadKey {
    /// File name stem for this key.
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.file_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.file_size.to_le_bytes());
        hasher.update(self.chunk_size.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Persisted progress of an interrupted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    #[serde(default)]
    pub received_chunks: BTreeSet<u32>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(key: &UploadKey, state: ResumeState, now: DateTime<Utc>) -> Self {
        Self {
            upload_id: state.upload_id,
            file_name: key.file_name.clone(),
            file_size: key.file_size,
            chunk_size: key.chunk_size,
            received_chunks: state.received_chunks,
            updated_at: now,
        }
    }

    fn matches(&self, key: &UploadKey) -> bool {
        self.file_name == key.file_name
            && self.file_size == key.file_size
            && self.chunk_size == key.chunk_size
    }

    pub fn into_state(self) -> ResumeState {
        ResumeState {
            upload_id: self.upload_id,
            received_chunks: self.received_chunks,
        }
    }
}

/// Directory of resume records.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &UploadKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    /// Returns the record for `key` if one exists and is newer than `max_age`.
    ///
    /// Unreadable, mismatched, or stale records are ignored.
    pub fn load(
        &self,
        key: &UploadKey,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Option<ResumeRecord> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read resume record");
                return None;
            }
        };
        let record: ResumeRecord = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt resume record");
                return None;
            }
        };
        if !record.matches(key) {
            tracing::debug!(path = %path.display(), "resume record belongs to another file");
            return None;
        }
        if now.signed_duration_since(record.updated_at) > max_age {
            tracing::info!(
                upload_id = %record.upload_id,
                updated_at = %record.updated_at,
                "resume record expired"
            );
            return None;
        }
        Some(record)
    }

    /// Writes `record`, replacing any previous one for the same key.
    pub fn save(&self, record: &ResumeRecord) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let key = UploadKey {
            file_name: record.file_name.clone(),
            file_size: record.file_size,
            chunk_size: record.chunk_size,
        };
        let path = self.path_for(&key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), chunks = record.received_chunks.len(), "resume record saved");
        Ok(path)
    }

    /// Deletes the record for `key`. Missing records are not an error.
    pub fn remove(&self, key: &UploadKey) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
