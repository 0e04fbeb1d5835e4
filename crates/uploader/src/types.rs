//! Coordinator configuration and resume state.

use std::collections::BTreeSet;
use std::time::Duration;

use diting_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL, DEFAULT_SPEED_WINDOW};
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`UploadCoordinator`](crate::UploadCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Fixed chunk size in bytes. 0 selects [`DEFAULT_CHUNK_SIZE`].
    pub chunk_size: u64,
    /// Minimum spacing of chunk progress notifications.
    pub progress_interval: Duration,
    /// Number of chunk samples in the speed moving average.
    pub speed_window: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            speed_window: DEFAULT_SPEED_WINDOW,
        }
    }
}

impl CoordinatorConfig {
    /// Chunk size with the 0 fallback applied.
    pub fn effective_chunk_size(&self) -> u64 {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

/// What a caller must keep to resume an interrupted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub upload_id: String,
    #[serde(default)]
    pub received_chunks: BTreeSet<u32>,
}

impl ResumeState {
    pub fn new(upload_id: impl Into<String>, received_chunks: impl IntoIterator<Item = u32>) -> Self {
        Self {
            upload_id: upload_id.into(),
            received_chunks: received_chunks.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chunk_size_falls_back_to_default() {
        let config = CoordinatorConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_chunk_size(), 10 * 1024 * 1024);
    }

    #[test]
    fn resume_state_dedups_and_sorts() {
        let state = ResumeState::new("u1", [2, 0, 2, 1]);
        assert_eq!(
            state.received_chunks.iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }
}
