use std::collections::BTreeSet;
use std::ops::Range;
use std::time::Duration;

use diting_protocol::{Phase, UploadProgress, progress_percent};

use crate::TransferError;
use crate::chunked::ChunkPlan;
use crate::progress::SpeedEstimator;

/// One chunk's byte range within the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTransfer {
    pub index: u32,
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
}

impl ChunkTransfer {
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// State of one upload attempt.
///
/// Not thread-safe on its own; the coordinator keeps it behind a lock.
/// All phase changes go through [`transition`](Self::transition).
#[derive(Debug, Clone)]
pub struct UploadSession {
    phase: Phase,
    plan: Option<ChunkPlan>,
    upload_id: Option<String>,
    received: BTreeSet<u32>,
    uploaded_bytes: u64,
    last_error: Option<String>,
    speed: SpeedEstimator,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new(SpeedEstimator::default())
    }
}

impl UploadSession {
    /// Creates an idle session.
    pub fn new(speed: SpeedEstimator) -> Self {
        Self {
            phase: Phase::Idle,
            plan: None,
            upload_id: None,
            received: BTreeSet::new(),
            uploaded_bytes: 0,
            last_error: None,
            speed,
        }
    }

    /// Moves to `next`, returning the previous phase.
    ///
    /// Entering `Cancelled` clears the last error.
    pub fn transition(&mut self, next: Phase) -> Result<Phase, TransferError> {
        let from = self.phase;
        if !from.can_transition_to(next) {
            return Err(TransferError::InvalidTransition { from, to: next });
        }
        self.phase = next;
        if next == Phase::Cancelled {
            self.last_error = None;
        }
        Ok(from)
    }

    /// Starts a session for `plan`: resets progress and enters `Initializing`.
    pub fn begin(&mut self, plan: ChunkPlan) -> Result<(), TransferError> {
        self.transition(Phase::Initializing)?;
        self.plan = Some(plan);
        self.upload_id = None;
        self.received.clear();
        self.uploaded_bytes = 0;
        self.last_error = None;
        self.speed.reset();
        Ok(())
    }

    /// Enters `Error` and records `message`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransferError> {
        self.transition(Phase::Error)?;
        self.last_error = Some(message.into());
        Ok(())
    }

    /// Returns the session to `Idle`, dropping all progress.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.plan = None;
        self.upload_id = None;
        self.received.clear();
        self.uploaded_bytes = 0;
        self.last_error = None;
        self.speed.reset();
    }

    /// Stores the backend-issued id. The id cannot be replaced once set.
    pub fn assign_upload_id(&mut self, id: impl Into<String>) -> Result<(), TransferError> {
        if let Some(existing) = &self.upload_id {
            return Err(TransferError::UploadIdAssigned(existing.clone()));
        }
        self.upload_id = Some(id.into());
        Ok(())
    }

    /// Marks chunks the backend already holds (resume).
    ///
    /// `uploaded_bytes` is recomputed from the exact ranges of the
    /// received indices.
    pub fn seed_received<'a>(
        &mut self,
        indices: impl IntoIterator<Item = &'a u32>,
    ) -> Result<(), TransferError> {
        let plan = self.plan.ok_or(TransferError::NotStarted)?;
        let total = plan.total_chunks();
        let indices: Vec<u32> = indices.into_iter().copied().collect();
        if let Some(&index) = indices.iter().find(|&&i| i >= total) {
            return Err(TransferError::ChunkOutOfRange { index, total });
        }
        self.received.extend(indices);
        self.uploaded_bytes = plan.bytes_in(&self.received).min(plan.file_size());
        Ok(())
    }

    /// Records a chunk accepted by the backend and its transfer time.
    ///
    /// Only valid while `Uploading`. Returns the new `uploaded_bytes`.
    pub fn mark_received(
        &mut self,
        chunk: &ChunkTransfer,
        duration: Duration,
    ) -> Result<u64, TransferError> {
        if self.phase != Phase::Uploading {
            return Err(TransferError::InvalidTransition {
                from: self.phase,
                to: Phase::Uploading,
            });
        }
        let plan = self.plan.ok_or(TransferError::NotStarted)?;
        if chunk.index >= plan.total_chunks() {
            return Err(TransferError::ChunkOutOfRange {
                index: chunk.index,
                total: plan.total_chunks(),
            });
        }
        if self.received.insert(chunk.index) {
            self.uploaded_bytes = (self.uploaded_bytes + chunk.len()).min(plan.file_size());
        }
        self.speed.add_sample(chunk.len(), duration);
        Ok(self.uploaded_bytes)
    }

    /// Chunks not yet received, in ascending index order.
    pub fn pending_chunks(&self) -> Vec<ChunkTransfer> {
        match &self.plan {
            Some(plan) => plan
                .chunks()
                .filter(|c| !self.received.contains(&c.index))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns `true` once every planned chunk has been received.
    pub fn all_received(&self) -> bool {
        self.plan
            .is_some_and(|p| self.received.len() as u64 == u64::from(p.total_chunks()))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn plan(&self) -> Option<&ChunkPlan> {
        self.plan.as_ref()
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    pub fn received_chunks(&self) -> &BTreeSet<u32> {
        &self.received
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.plan.map(|p| p.file_size()).unwrap_or(0)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current moving-average rate.
    pub fn speed(&self) -> Option<f64> {
        self.speed.bytes_per_second()
    }

    /// Time to send the bytes not yet received.
    pub fn eta(&self) -> Option<Duration> {
        self.speed
            .eta(self.total_bytes().saturating_sub(self.uploaded_bytes))
    }

    /// Observable snapshot of this session.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            phase: self.phase,
            progress: progress_percent(self.uploaded_bytes, self.total_bytes()),
            uploaded_bytes: self.uploaded_bytes,
            total_bytes: self.total_bytes(),
            speed: self.speed(),
            eta: self.eta().map(|d| d.as_secs_f64()),
            error: self.last_error.clone(),
            upload_id: self.upload_id.clone(),
        }
    }
}
