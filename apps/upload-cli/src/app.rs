//! Application orchestrator: wires config, resume records, and the coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use diting_protocol::{Phase, UploadProgress};
use diting_transfer::{ChunkSource, FileSource, format_bytes, format_eta, format_speed};
use diting_upload_client::Client;
use diting_uploader::{CoordinatorConfig, ResumeState, UploadCoordinator, UploadError};

use crate::bridge::HttpBackend;
use crate::config::Config;
use crate::resume::{ResumeRecord, ResumeStore, UploadKey};

/// Parsed command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub file: PathBuf,
    /// Ignore and discard any saved resume record.
    pub fresh: bool,
}

/// Uploads one file and prints the created task as JSON on stdout.
pub async fn run(config: Config, args: Args) -> anyhow::Result<()> {
    let source = FileSource::open(&args.file)
        .await
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let client = Client::with_connect_timeout(&config.server_url, config.connect_timeout())?;

    let coord_config = CoordinatorConfig {
        chunk_size: config.chunk_size(),
        ..CoordinatorConfig::default()
    };
    let key = UploadKey {
        file_name: source.name().to_string(),
        file_size: source.size(),
        chunk_size: coord_config.effective_chunk_size(),
    };
    let store = ResumeStore::new(&config.state_dir);

    let resume = if args.fresh {
        store.remove(&key)?;
        None
    } else {
        resolve_resume(&client, &store, &key, config.resume_max_age()).await
    };

    let coordinator = Arc::new(UploadCoordinator::new(HttpBackend::new(client), coord_config));
    coordinator.on_progress(Box::new(render_progress));

    // -- Ctrl-C cancels the upload --
    let interrupt = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("SIGINT received, cancelling upload");
                coordinator.cancel().await;
            }
        })
    };

    let result = coordinator
        .start(&source, config.task_options(), resume)
        .await;

    match result {
        Ok(handle) => {
            interrupt.abort();
            store.remove(&key)?;
            tracing::info!(task_id = ?handle.id, status = %handle.status, "task created");
            println!("{}", serde_json::to_string_pretty(&handle)?);
            Ok(())
        }
        Err(UploadError::Cancelled) => {
            // Let the release request finish before exiting.
            let _ = interrupt.await;
            store.remove(&key)?;
            anyhow::bail!("upload cancelled")
        }
        Err(e) => {
            interrupt.abort();
            record_failure(&store, &key, &e, coordinator.resume_state())?;
            Err(e.into())
        }
    }
}

/// Updates the resume record after a failed upload.
///
/// A rejected resume state is dropped so the next run starts fresh.
fn record_failure(
    store: &ResumeStore,
    key: &UploadKey,
    err: &UploadError,
    state: Option<ResumeState>,
) -> anyhow::Result<()> {
    if matches!(err, UploadError::InvalidResume(_)) {
        tracing::warn!(error = %err, "discarding unusable resume record");
        discard(store, key);
        return Ok(());
    }
    if let Some(state) = state {
        let path = store.save(&ResumeRecord::new(key, state, Utc::now()))?;
        tracing::info!(path = %path.display(), "resume record saved; run again to resume");
    }
    Ok(())
}

/// Picks the resume point for `key`, preferring the server's view.
async fn resolve_resume(
    client: &Client,
    store: &ResumeStore,
    key: &UploadKey,
    max_age: chrono::Duration,
) -> Option<ResumeState> {
    let record = store.load(key, max_age, Utc::now())?;
    let expected_chunks = key.file_size.div_ceil(key.chunk_size);

    match client.status(&record.upload_id).await {
        Ok(status) if u64::from(status.total_chunks) != expected_chunks => {
            tracing::warn!(
                upload_id = %record.upload_id,
                server_chunks = status.total_chunks,
                expected_chunks,
                "server upload has a different layout; starting fresh"
            );
            discard(store, key);
            None
        }
        Ok(status) => {
            tracing::info!(
                upload_id = %record.upload_id,
                received = status.received_chunks.len(),
                total = status.total_chunks,
                "resuming previous upload"
            );
            Some(ResumeState::new(record.upload_id, status.received_chunks))
        }
        Err(e) if e.status() == Some(404) => {
            tracing::info!(upload_id = %record.upload_id, "server no longer has this upload; starting fresh");
            discard(store, key);
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "status query failed; resuming from local record");
            Some(record.into_state())
        }
    }
}

fn discard(store: &ResumeStore, key: &UploadKey) {
    if let Err(e) = store.remove(key) {
        tracing::warn!(error = %e, "failed to remove resume record");
    }
}

/// Renders one progress line on stderr.
fn render_progress(p: &UploadProgress) {
    eprint!("\r\x1b[2K{}", progress_line(p));
    if p.phase.is_terminal() {
        eprintln!();
    }
}

fn progress_line(p: &UploadProgress) -> String {
    match p.phase {
        Phase::Uploading => format!(
            "uploading {:>3}%  {} / {}  {}  ETA {}",
            p.progress,
            format_bytes(p.uploaded_bytes),
            format_bytes(p.total_bytes),
            format_speed(p.speed),
            format_eta(p.eta.and_then(|s| Duration::try_from_secs_f64(s).ok())),
        ),
        Phase::Error => format!("error: {}", p.error.as_deref().unwrap_or("unknown")),
        phase => format!("{phase} {:>3}%", p.progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diting_uploader::BackendError;

    fn key() -> UploadKey {
        UploadKey {
            file_name: "talk.mp4".into(),
            file_size: 25,
            chunk_size: 10,
        }
    }

    fn saved(store: &ResumeStore) -> Option<ResumeRecord> {
        store.load(&key(), chrono::Duration::hours(1), Utc::now())
    }

    #[test]
    fn invalid_resume_discards_stale_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(tmp.path());
        let stale = ResumeRecord::new(&key(), ResumeState::new("u-1", [0, 7]), Utc::now());
        store.save(&stale).unwrap();

        let err = UploadError::InvalidResume("chunk index 7 out of range for 3 chunks".into());
        record_failure(&store, &key(), &err, None).unwrap();
        assert!(saved(&store).is_none());
    }

    #[test]
    fn chunk_failure_saves_resume_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(tmp.path());
        let err = UploadError::Chunk {
            index: 2,
            source: BackendError::Status {
                status: 500,
                message: "disk full".into(),
            },
        };

        record_failure(&store, &key(), &err, Some(ResumeState::new("u-1", [0, 1]))).unwrap();
        let record = saved(&store).unwrap();
        assert_eq!(record.into_state(), ResumeState::new("u-1", [0, 1]));
    }

    #[test]
    fn failure_before_init_leaves_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(tmp.path());
        let err = UploadError::Init(BackendError::Transport("connection refused".into()));

        record_failure(&store, &key(), &err, None).unwrap();
        assert!(saved(&store).is_none());
    }

    #[test]
    fn progress_line_uploading() {
        let p = UploadProgress {
            phase: Phase::Uploading,
            progress: 40,
            uploaded_bytes: 10 * 1024 * 1024,
            total_bytes: 25 * 1024 * 1024,
            speed: Some(2.0 * 1024.0 * 1024.0),
            eta: Some(7.5),
            ..Default::default()
        };
        assert_eq!(
            progress_line(&p),
            "uploading  40%  10.0 MiB / 25.0 MiB  2.0 MiB/s  ETA 0:08"
        );
    }

    #[test]
    fn progress_line_unknown_speed() {
        let p = UploadProgress {
            phase: Phase::Uploading,
            total_bytes: 100,
            ..Default::default()
        };
        assert!(progress_line(&p).ends_with("--  ETA --:--"));
    }

    #[test]
    fn progress_line_error_and_done() {
        let p = UploadProgress {
            phase: Phase::Error,
            error: Some("chunk 2 failed: HTTP 500: disk full".into()),
            ..Default::default()
        };
        assert_eq!(progress_line(&p), "error: chunk 2 failed: HTTP 500: disk full");

        let p = UploadProgress {
            phase: Phase::Done,
            progress: 100,
            ..Default::default()
        };
        assert_eq!(progress_line(&p), "done 100%");
    }
}
