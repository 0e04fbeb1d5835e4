//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/diting/upload.toml`
//! - Windows: `%APPDATA%/diting/upload.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use diting_protocol::TaskOptions;
use diting_protocol::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_LANGUAGE, DEFAULT_TASK_TYPE};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the DiTing server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Chunk size in MiB (0 = default).
    #[serde(default = "default_chunk_size_mib")]
    pub chunk_size_mib: u64,

    /// HTTP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_task_type")]
    pub task_type: String,

    /// Transcription language code.
    #[serde(default = "default_language")]
    pub language: String,

    /// Run vocal separation before transcription.
    #[serde(default)]
    pub use_uvr: bool,

    /// Initial prompt passed to the transcriber.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Requested output format (server default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// Directory holding resume records.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Resume records older than this are ignored.
    #[serde(default = "default_resume_max_age_hours")]
    pub resume_max_age_hours: u64,
}

fn default_server_url() -> String {
    "http://localhost:5023/api".into()
}

fn default_chunk_size_mib() -> u64 {
    DEFAULT_CHUNK_SIZE / MIB
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_task_type() -> String {
    DEFAULT_TASK_TYPE.into()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}

fn default_state_dir() -> PathBuf {
    config_dir().join("uploads")
}

fn default_resume_max_age_hours() -> u64 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            chunk_size_mib: default_chunk_size_mib(),
            connect_timeout_secs: default_connect_timeout_secs(),
            task_type: default_task_type(),
            language: default_language(),
            use_uvr: false,
            prompt: None,
            output_format: None,
            state_dir: default_state_dir(),
            resume_max_age_hours: default_resume_max_age_hours(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size_mib.saturating_mul(MIB)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn resume_max_age(&self) -> chrono::Duration {
        i64::try_from(self.resume_max_age_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Task options sent on init.
    pub fn task_options(&self) -> TaskOptions {
        TaskOptions {
            task_type: self.task_type.clone(),
            use_uvr: self.use_uvr,
            language: self.language.clone(),
            prompt: self.prompt.clone(),
            output_format: self.output_format.clone(),
        }
    }
}

/// Returns the platform-specific configuration directory.
fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("diting")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config").join("diting")
    }
}

fn config_path() -> PathBuf {
    config_dir().join("upload.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.server_url, "http://localhost:5023/api");
        assert_eq!(config.chunk_size_mib, 10);
        assert_eq!(config.chunk_size(), 10 * 1024 * 1024);
        assert_eq!(config.task_type, "transcribe");
        assert_eq!(config.language, "zh");
        assert!(!config.use_uvr);
        assert!(config.prompt.is_none());
        assert_eq!(config.resume_max_age_hours, 24);
        assert!(config.state_dir.ends_with("uploads"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            server_url: "https://diting.lan".into(),
            chunk_size_mib: 4,
            use_uvr: true,
            prompt: Some("技术讲座".into()),
            output_format: Some("srt".into()),
            state_dir: PathBuf::from("/var/lib/diting"),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_toml() {
        // Only specify the server, rest should use defaults.
        let toml_str = r#"server_url = "http://10.0.0.5:5023""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_url, "http://10.0.0.5:5023");
        assert_eq!(config.chunk_size_mib, 10);
        assert_eq!(config.language, "zh");
    }

    #[test]
    fn task_options_follow_config() {
        let config = Config {
            language: "en".into(),
            use_uvr: true,
            ..Config::default()
        };
        let opts = config.task_options();
        assert_eq!(opts.language, "en");
        assert!(opts.use_uvr);
        assert_eq!(opts.task_type, "transcribe");
        assert!(opts.output_format.is_none());
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("diting"));
    }

    #[test]
    fn load_creates_default_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("upload.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        std::fs::write(&path, "chunk_size_mib = 2\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.chunk_size(), 2 * 1024 * 1024);
    }
}
