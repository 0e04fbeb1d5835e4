use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LANGUAGE, DEFAULT_TASK_TYPE};

/// Processing options forwarded to the backend on init.
///
/// Opaque to the upload coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub use_uvr: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

fn default_task_type() -> String {
    DEFAULT_TASK_TYPE.into()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            task_type: default_task_type(),
            use_uvr: false,
            language: default_language(),
            prompt: None,
            output_format: None,
        }
    }
}

/// Lifecycle phase of one upload attempt.
///
/// `Done`, `Error` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Initializing,
    Uploading,
    Finalizing,
    Done,
    Error,
    Cancelled,
}

impl Phase {
    /// Returns `true` for phases that accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Error | Phase::Cancelled)
    }

    /// Returns `true` while a session is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Phase::Initializing | Phase::Uploading | Phase::Finalizing
        )
    }

    /// Returns `true` if `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Idle, Initializing) => true,
            (Initializing, Uploading) => true,
            (Uploading, Finalizing) => true,
            (Finalizing, Done) => true,
            (Initializing | Uploading | Finalizing, Error) => true,
            (Idle | Initializing | Uploading | Finalizing, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::Uploading => "uploading",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
            Phase::Error => "error",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable progress of an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub phase: Phase,
    /// Whole percent, 0-100.
    pub progress: u8,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// Bytes per second; `None` until a rate is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Seconds remaining; `None` when the rate is zero or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

/// Whole-percent progress: `round(min(100, uploaded / total * 100))`.
///
/// Returns 0 when `total_bytes` is 0.
pub fn progress_percent(uploaded_bytes: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 0;
    }
    let pct = (uploaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0);
    pct.round() as u8
}
