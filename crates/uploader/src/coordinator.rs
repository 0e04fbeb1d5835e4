//! Upload coordinator: drives one file from `idle` to a terminal phase.
//!
//! Chunks are sent strictly one at a time in ascending index order; the
//! next chunk is only issued after the previous response is observed.
//! A single [`CancellationToken`] is threaded through every backend call,
//! and any call that resolves after the token fires is treated as
//! cancelled regardless of its outcome.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use diting_protocol::{InitUploadRequest, Phase, TaskHandle, TaskOptions, UploadProgress};
use diting_transfer::{
    ChunkPlan, ChunkSource, ProgressThrottle, SpeedEstimator, TransferError, UploadSession,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ChunkRequest, UploadBackend};
use crate::error::{BackendError, UploadError};
use crate::types::{CoordinatorConfig, ResumeState};

/// Callback invoked with every published progress snapshot.
///
/// Runs while the coordinator's state lock is held, so it must not call
/// back into the coordinator.
pub type ProgressCallback = Box<dyn Fn(&UploadProgress) + Send + Sync>;

/// Coordinates one chunked upload against an [`UploadBackend`].
///
/// Share it behind an `Arc` to call [`cancel`](Self::cancel) from another
/// task while [`start`](Self::start) is running. Calling `start` twice
/// concurrently is rejected with [`UploadError::NotIdle`].
pub struct UploadCoordinator<B> {
    backend: B,
    config: CoordinatorConfig,
    state: Mutex<CoordinatorState>,
    callbacks: Mutex<Vec<ProgressCallback>>,
    progress_tx: watch::Sender<UploadProgress>,
}

struct CoordinatorState {
    session: UploadSession,
    cancel: CancellationToken,
    throttle: ProgressThrottle,
}

impl<B: UploadBackend> UploadCoordinator<B> {
    /// Creates an idle coordinator.
    pub fn new(backend: B, config: CoordinatorConfig) -> Self {
        let session = UploadSession::new(SpeedEstimator::new(config.speed_window));
        let (progress_tx, _) = watch::channel(session.progress());
        Self {
            backend,
            state: Mutex::new(CoordinatorState {
                session,
                cancel: CancellationToken::new(),
                throttle: ProgressThrottle::new(config.progress_interval),
            }),
            config,
            callbacks: Mutex::new(Vec::new()),
            progress_tx,
        }
    }

    /// Uploads `source` and returns the task created by finalize.
    ///
    /// With `resume`, init is skipped: the supplied upload id is reused and
    /// its received chunks are not sent again.
    pub async fn start(
        &self,
        source: &dyn ChunkSource,
        options: TaskOptions,
        resume: Option<ResumeState>,
    ) -> Result<TaskHandle, UploadError> {
        let file_size = source.size();
        if file_size == 0 {
            return Err(UploadError::EmptyFile);
        }
        let plan = ChunkPlan::new(file_size, self.config.effective_chunk_size())?;
        if let Some(resume) = &resume {
            validate_resume(resume, &plan)?;
        }

        let cancel = {
            let mut state = self.lock();
            match state.session.phase() {
                Phase::Idle => {}
                Phase::Cancelled => return Err(UploadError::Cancelled),
                other => return Err(UploadError::NotIdle(other)),
            }
            state.session.begin(plan)?;
            state.throttle.reset();
            self.publish(&state);
            state.cancel.clone()
        };

        info!(
            file = source.name(),
            file_size,
            total_chunks = plan.total_chunks(),
            chunk_size = plan.chunk_size(),
            resume = resume.is_some(),
            "upload starting"
        );

        match self.run(source, &plan, options, resume, &cancel).await {
            Ok(handle) => Ok(handle),
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                self.settle_cancelled();
                Err(UploadError::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "upload failed");
                let mut state = self.lock();
                if state.session.fail(e.to_string()).is_ok() {
                    self.publish(&state);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        source: &dyn ChunkSource,
        plan: &ChunkPlan,
        options: TaskOptions,
        resume: Option<ResumeState>,
        cancel: &CancellationToken,
    ) -> Result<TaskHandle, UploadError> {
        // 1. Init (or adopt the resumed id).
        let upload_id = match resume {
            Some(resume) => {
                let mut state = self.lock();
                state.session.assign_upload_id(resume.upload_id.clone())?;
                state.session.seed_received(&resume.received_chunks)?;
                info!(
                    upload_id = %resume.upload_id,
                    received = resume.received_chunks.len(),
                    uploaded_bytes = state.session.uploaded_bytes(),
                    "resuming upload"
                );
                resume.upload_id
            }
            None => {
                let request = InitUploadRequest {
                    filename: source.name().to_string(),
                    file_size: plan.file_size(),
                    total_chunks: plan.total_chunks(),
                    options,
                };
                let response = cancellable(cancel, self.backend.init(&request, cancel))
                    .await?
                    .map_err(UploadError::Init)?;
                if response.upload_id.is_empty() {
                    return Err(UploadError::Init(BackendError::Protocol(
                        "empty upload_id".into(),
                    )));
                }
                self.lock()
                    .session
                    .assign_upload_id(response.upload_id.clone())?;
                info!(upload_id = %response.upload_id, "upload initialized");
                response.upload_id
            }
        };

        // 2. Chunks, ascending, skipping what the backend already holds.
        let pending = {
            let mut state = self.lock();
            state.session.transition(Phase::Uploading).map_err(cancel_aware)?;
            self.publish(&state);
            state.session.pending_chunks()
        };
        let last_index = pending.last().map(|c| c.index);

        for chunk in pending {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let data = cancellable(cancel, source.read_range(chunk.range()))
                .await?
                .map_err(|err| UploadError::Read {
                    index: chunk.index,
                    source: err,
                })?;
            let request = ChunkRequest {
                upload_id: upload_id.clone(),
                index: chunk.index,
                file_name: source.name().to_string(),
                data,
            };

            let started = Instant::now();
            let response = cancellable(cancel, self.backend.upload_chunk(request, cancel))
                .await?
                .map_err(|err| UploadError::Chunk {
                    index: chunk.index,
                    source: err,
                })?;
            let elapsed = started.elapsed();

            if response.index != chunk.index {
                warn!(
                    sent = chunk.index,
                    acknowledged = response.index,
                    "backend acknowledged a different chunk index"
                );
            }

            let mut state = self.lock();
            let uploaded = state
                .session
                .mark_received(&chunk, elapsed)
                .map_err(cancel_aware)?;
            let is_last = Some(chunk.index) == last_index;
            if state.throttle.should_emit(Instant::now(), is_last) {
                self.publish(&state);
            }
            debug!(
                index = chunk.index,
                bytes = chunk.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                uploaded,
                status = ?response.status,
                "chunk sent"
            );
        }

        // 3. Finalize.
        {
            let mut state = self.lock();
            debug_assert!(state.session.all_received());
            debug_assert_eq!(state.session.uploaded_bytes(), plan.file_size());
            state.session.transition(Phase::Finalizing).map_err(cancel_aware)?;
            self.publish(&state);
        }
        let handle = cancellable(cancel, self.backend.finalize(&upload_id, cancel))
            .await?
            .map_err(UploadError::Finalize)?;
        {
            let mut state = self.lock();
            state.session.transition(Phase::Done).map_err(cancel_aware)?;
            self.publish(&state);
        }
        info!(upload_id = %upload_id, task_id = ?handle.id, status = %handle.status, "upload finalized");

        Ok(handle)
    }

    /// Cancels the current session.
    ///
    /// The in-flight call is abandoned and, if an upload id was assigned,
    /// the backend is asked to release the partial upload. A failed
    /// release is logged only. No-op once the session is terminal.
    pub async fn cancel(&self) {
        let upload_id = {
            let mut state = self.lock();
            let phase = state.session.phase();
            if phase.is_terminal() {
                debug!(%phase, "cancel ignored: session already finished");
                return;
            }
            state.cancel.cancel();
            if let Err(e) = state.session.transition(Phase::Cancelled) {
                warn!(error = %e, "cancel transition rejected");
                return;
            }
            self.publish(&state);
            state.session.upload_id().map(str::to_string)
        };

        info!(upload_id = upload_id.as_deref().unwrap_or("-"), "upload cancelled");

        if let Some(id) = upload_id {
            match self.backend.delete(&id).await {
                Ok(()) => debug!(upload_id = %id, "partial upload released"),
                Err(e) => warn!(upload_id = %id, error = %e, "failed to release partial upload"),
            }
        }
    }

    /// Returns a finished coordinator to `idle` so it can start again.
    pub fn reset(&self) -> Result<(), UploadError> {
        let mut state = self.lock();
        let phase = state.session.phase();
        if phase.is_active() {
            return Err(UploadError::NotIdle(phase));
        }
        state.session.reset();
        state.cancel = CancellationToken::new();
        state.throttle.reset();
        self.publish(&state);
        Ok(())
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    /// Subscribes to progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress_tx.subscribe()
    }

    /// Current (unthrottled) progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        self.lock().session.progress()
    }

    pub fn phase(&self) -> Phase {
        self.lock().session.phase()
    }

    /// Upload id and received chunks, once an id has been assigned.
    ///
    /// Persist this to resume after a failure.
    pub fn resume_state(&self) -> Option<ResumeState> {
        let state = self.lock();
        let upload_id = state.session.upload_id()?;
        Some(ResumeState {
            upload_id: upload_id.to_string(),
            received_chunks: state.session.received_chunks().clone(),
        })
    }

    #[cfg(test)]
    fn backend(&self) -> &B {
        &self.backend
    }

    fn settle_cancelled(&self) {
        let mut state = self.lock();
        if !state.session.phase().is_terminal()
            && state.session.transition(Phase::Cancelled).is_ok()
        {
            self.publish(&state);
        }
    }

    fn publish(&self, state: &CoordinatorState) {
        let snapshot = state.session.progress();
        for callback in self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            callback(&snapshot);
        }
        self.progress_tx.send_replace(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Awaits `fut` unless `cancel` fires first; a result that arrives after
/// cancellation is discarded.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, UploadError> {
    let out = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
        out = fut => out,
    };
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled);
    }
    Ok(out)
}

/// A session moved to `Cancelled` by [`UploadCoordinator::cancel`] rejects
/// further transitions; report that as cancellation.
fn cancel_aware(err: TransferError) -> UploadError {
    match err {
        TransferError::InvalidTransition {
            from: Phase::Cancelled,
            ..
        } => UploadError::Cancelled,
        other => UploadError::Transfer(other),
    }
}

fn validate_resume(resume: &ResumeState, plan: &ChunkPlan) -> Result<(), UploadError> {
    if resume.upload_id.is_empty() {
        return Err(UploadError::InvalidResume("empty upload id".into()));
    }
    let total = plan.total_chunks();
    if let Some(index) = resume.received_chunks.iter().find(|&&i| i >= total) {
        return Err(UploadError::InvalidResume(format!(
            "chunk index {index} out of range for {total} chunks"
        )));
    }
    Ok(())
}
