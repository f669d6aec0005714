mod types;

pub use types::*;

use crate::conversion::{BatchHandle, JobResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use vidbatch_common::{BatchId, Error, JobId, Result};

/// Finished batches beyond this many are forgotten, oldest first.
const MAX_RETAINED_BATCHES: usize = 100;

/// Application-wide event for SSE broadcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A batch was accepted and is waiting for the encoder.
    BatchQueued { batch_id: BatchId, total_jobs: usize },
    /// A batch acquired the encoder.
    BatchStarted { batch_id: BatchId },
    /// ffmpeg was launched for a job (again, on software fallback).
    JobStarted {
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        input_name: String,
        encoder: String,
    },
    /// A job's progress has been updated.
    JobProgress {
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        progress: f32,
        /// Overall batch progress.
        overall: f32,
    },
    JobSucceeded {
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        output_path: PathBuf,
        encoder: Option<String>,
        gpu_fallback: bool,
    },
    JobFailed {
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        error: String,
    },
    BatchCompleted {
        batch_id: BatchId,
        status: BatchStatus,
        succeeded: usize,
        failed: usize,
        report: String,
    },
}

impl AppEvent {
    pub fn batch_id(&self) -> BatchId {
        match self {
            AppEvent::BatchQueued { batch_id, .. }
            | AppEvent::BatchStarted { batch_id }
            | AppEvent::JobStarted { batch_id, .. }
            | AppEvent::JobProgress { batch_id, .. }
            | AppEvent::JobSucceeded { batch_id, .. }
            | AppEvent::JobFailed { batch_id, .. }
            | AppEvent::BatchCompleted { batch_id, .. } => *batch_id,
        }
    }

    pub fn batch_queued(batch_id: BatchId, total_jobs: usize) -> Self {
        AppEvent::BatchQueued {
            batch_id,
            total_jobs,
        }
    }

    pub fn batch_started(batch_id: BatchId) -> Self {
        AppEvent::BatchStarted { batch_id }
    }

    pub fn job_started(
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        input_name: &str,
        encoder: &str,
    ) -> Self {
        AppEvent::JobStarted {
            batch_id,
            job_id,
            index,
            input_name: input_name.to_string(),
            encoder: encoder.to_string(),
        }
    }

    pub fn job_progress(
        batch_id: BatchId,
        job_id: JobId,
        index: usize,
        progress: f32,
        overall: f32,
    ) -> Self {
        AppEvent::JobProgress {
            batch_id,
            job_id,
            index,
            progress,
            overall,
        }
    }

    /// `JobSucceeded` or `JobFailed`, depending on the result.
    pub fn job_finished(batch_id: BatchId, index: usize, result: &JobResult) -> Self {
        match result.output_path {
            Some(ref output_path) if result.is_success() => AppEvent::JobSucceeded {
                batch_id,
                job_id: result.job.id,
                index,
                output_path: output_path.clone(),
                encoder: result.encoder.clone(),
                gpu_fallback: result.gpu_fallback,
            },
            _ => AppEvent::JobFailed {
                batch_id,
                job_id: result.job.id,
                index,
                error: result.error.clone().unwrap_or_default(),
            },
        }
    }

    pub fn batch_completed(snapshot: &BatchSnapshot) -> Self {
        AppEvent::BatchCompleted {
            batch_id: snapshot.id,
            status: snapshot.status,
            succeeded: snapshot.succeeded(),
            failed: snapshot.failed(),
            report: snapshot.report(),
        }
    }
}

/// Registry of submitted batches plus the event bus.
pub struct AppState {
    batches: RwLock<HashMap<BatchId, BatchHandle>>,
    /// Newest first.
    order: RwLock<VecDeque<BatchId>>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);

        Arc::new(Self {
            batches: RwLock::new(HashMap::new()),
            order: RwLock::new(VecDeque::new()),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// Get a clone of the event sender for use in other components.
    pub fn event_sender(&self) -> broadcast::Sender<AppEvent> {
        self.event_tx.clone()
    }

    /// Broadcast an event to all subscribers.
    pub fn broadcast(&self, event: AppEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("No subscribers for event");
        }
    }

    /// Track a submitted batch.
    pub fn register(&self, handle: BatchHandle) {
        let id = handle.id();
        self.batches.write().insert(id, handle);
        self.order.write().push_front(id);
        self.evict();
    }

    fn evict(&self) {
        let mut order = self.order.write();
        if order.len() <= MAX_RETAINED_BATCHES {
            return;
        }

        let mut batches = self.batches.write();
        let mut excess = order.len() - MAX_RETAINED_BATCHES;
        // Oldest finished batches go first; running ones are never dropped.
        let mut index = order.len();
        while excess > 0 && index > 0 {
            index -= 1;
            let id = order[index];
            let finished = batches.get(&id).map_or(true, |h| h.is_finished());
            if finished {
                batches.remove(&id);
                order.remove(index);
                excess -= 1;
            }
        }
    }

    pub fn handle(&self, id: BatchId) -> Option<BatchHandle> {
        self.batches.read().get(&id).cloned()
    }

    pub fn get_batch(&self, id: BatchId) -> Option<BatchSnapshot> {
        self.batches.read().get(&id).map(BatchHandle::snapshot)
    }

    /// Most recent batches first.
    pub fn list_batches(&self, limit: usize) -> Vec<BatchSnapshot> {
        let order = self.order.read();
        let batches = self.batches.read();
        order
            .iter()
            .filter_map(|id| batches.get(id))
            .take(limit)
            .map(BatchHandle::snapshot)
            .collect()
    }

    /// Request cancellation of a batch.
    pub fn cancel_batch(&self, id: BatchId) -> Result<BatchSnapshot> {
        let handle = self
            .handle(id)
            .ok_or_else(|| Error::not_found(format!("batch {}", id)))?;

        if handle.is_finished() {
            return Err(Error::conflict(format!("batch {} has already finished", id)));
        }

        tracing::info!("Cancelling batch {}", id);
        handle.cancel();
        Ok(handle.snapshot())
    }

    /// Cancel every unfinished batch. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let batches = self.batches.read();
        let mut count = 0;
        for handle in batches.values().filter(|h| !h.is_finished()) {
            handle.cancel();
            count += 1;
        }
        count
    }

    pub fn active_count(&self) -> usize {
        self.batches
            .read()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn get_stats(&self) -> BatchStats {
        let batches = self.batches.read();
        let mut stats = BatchStats::default();
        for handle in batches.values() {
            stats.record(&handle.snapshot());
        }
        stats
    }
}
