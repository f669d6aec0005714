//! Batch conversion orchestrator.
//!
//! A submitted batch runs on its own task. Jobs run one after another and at
//! most one batch holds the encoder slot at a time, so only a single ffmpeg
//! process is ever alive. Every job produces exactly one [`JobResult`], in
//! submission order, whatever happens to it.

use super::command::{build_args, encoder_name, EncodeOptions, EncoderChoice, OutputNamer};
use super::job::{ConversionJob, JobResult};
use super::transcoder::{HardwareSupport, Transcoder};
use crate::config::ConversionConfig;
use crate::state::{AppEvent, BatchSnapshot};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vidbatch_av::Workspace;
use vidbatch_common::paths::is_video_file;
use vidbatch_common::BatchId;

/// Static settings shared by every batch.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Each batch writes to `<output_dir>/<batch id>/`.
    pub output_dir: PathBuf,
    pub encode: EncodeOptions,
    pub hardware: HardwareSupport,
    pub keep_uploads: bool,
}

impl OrchestratorConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            encode: EncodeOptions::default(),
            hardware: HardwareSupport::none(),
            keep_uploads: false,
        }
    }

    pub fn from_config(config: &ConversionConfig, hardware: HardwareSupport) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            encode: EncodeOptions::from(config),
            hardware,
            keep_uploads: config.keep_uploads,
        }
    }

    pub fn with_hardware(mut self, hardware: HardwareSupport) -> Self {
        self.hardware = hardware;
        self
    }
}

/// Accepts batches and runs them in the background.
#[derive(Clone)]
pub struct Orchestrator {
    transcoder: Arc<dyn Transcoder>,
    config: Arc<OrchestratorConfig>,
    events: broadcast::Sender<AppEvent>,
    slot: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        config: OrchestratorConfig,
        events: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            transcoder,
            config: Arc::new(config),
            events,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn hardware(&self) -> &HardwareSupport {
        &self.config.hardware
    }

    /// Queue a batch of jobs. Must be called from within a tokio runtime.
    pub fn submit(&self, jobs: Vec<ConversionJob>) -> BatchHandle {
        self.submit_staged(jobs, None)
    }

    /// Queue a batch whose inputs live in `workspace`.
    ///
    /// The workspace is removed once the batch finishes unless uploads are
    /// configured to be kept.
    pub fn submit_staged(
        &self,
        jobs: Vec<ConversionJob>,
        workspace: Option<Workspace>,
    ) -> BatchHandle {
        let id = BatchId::new();
        let output_dir = self.config.output_dir.join(id.to_string());
        let (snapshot_tx, snapshot_rx) =
            watch::channel(BatchSnapshot::new(id, &jobs, output_dir.clone()));
        let (batch_tx, _) = broadcast::channel(256);
        let cancel = CancellationToken::new();

        let emitter = Emitter {
            global: self.events.clone(),
            batch: batch_tx.clone(),
        };
        emitter.send(AppEvent::batch_queued(id, jobs.len()));
        info!("Queued batch {} with {} file(s)", id, jobs.len());

        let run = BatchRun {
            id,
            jobs,
            output_dir,
            workspace,
            snapshot: snapshot_tx,
            emitter,
            cancel: cancel.clone(),
            orchestrator: self.clone(),
        };
        tokio::spawn(run.run());

        BatchHandle {
            id,
            snapshot: snapshot_rx,
            events: batch_tx,
            cancel,
        }
    }

    /// Run a batch to completion.
    pub async fn convert(&self, jobs: Vec<ConversionJob>) -> Vec<JobResult> {
        self.submit(jobs).wait().await
    }
}

/// Handle to a submitted batch.
#[derive(Clone)]
pub struct BatchHandle {
    id: BatchId,
    snapshot: watch::Receiver<BatchSnapshot>,
    events: broadcast::Sender<AppEvent>,
    cancel: CancellationToken,
}

impl BatchHandle {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Latest state of the batch.
    pub fn snapshot(&self) -> BatchSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Events for this batch only, from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Stop the batch. The running ffmpeg process is killed and every job
    /// that has not finished is recorded as failed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.snapshot.borrow().is_finished()
    }

    /// Wait for the batch to finish and return its results.
    pub async fn wait(&self) -> Vec<JobResult> {
        let mut rx = self.snapshot.clone();
        let finished = rx
            .wait_for(|s| s.is_finished())
            .await
            .map(|s| s.results.clone());
        match finished {
            Ok(results) => results,
            Err(_) => {
                error!("Batch {} task ended without finishing", self.id);
                let results = rx.borrow().results.clone();
                results
            }
        }
    }
}

#[derive(Clone)]
struct Emitter {
    global: broadcast::Sender<AppEvent>,
    batch: broadcast::Sender<AppEvent>,
}

impl Emitter {
    fn send(&self, event: AppEvent) {
        let _ = self.batch.send(event.clone());
        if self.global.send(event).is_err() {
            debug!("No subscribers for batch event");
        }
    }
}

struct BatchRun {
    id: BatchId,
    jobs: Vec<ConversionJob>,
    output_dir: PathBuf,
    workspace: Option<Workspace>,
    snapshot: watch::Sender<BatchSnapshot>,
    emitter: Emitter,
    cancel: CancellationToken,
    orchestrator: Orchestrator,
}

impl BatchRun {
    async fn run(mut self) {
        let jobs = std::mem::take(&mut self.jobs);
        let slot = Arc::clone(&self.orchestrator.slot);

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = slot.acquire_owned() => permit.ok(),
        };

        if permit.is_some() {
            info!("Starting batch {} ({} file(s))", self.id, jobs.len());
            self.snapshot.send_modify(|s| s.start());
            self.emitter.send(AppEvent::batch_started(self.id));
        } else {
            info!("Batch {} cancelled before it started", self.id);
        }

        let setup_error = if permit.is_none() {
            None
        } else {
            match tokio::fs::create_dir_all(&self.output_dir).await {
                Ok(()) => None,
                Err(e) => {
                    error!("Failed to create output directory {:?}: {}", self.output_dir, e);
                    Some(format!(
                        "Failed to create output directory {}: {}",
                        self.output_dir.display(),
                        e
                    ))
                }
            }
        };

        let mut namer = OutputNamer::new(&self.output_dir);

        for (index, job) in jobs.into_iter().enumerate() {
            let result = if permit.is_none() || self.cancel.is_cancelled() {
                JobResult::cancelled(job, None)
            } else if let Some(ref message) = setup_error {
                JobResult::failed(job, message.clone(), None)
            } else {
                self.run_job(index, job, &mut namer).await
            };

            self.emitter.send(AppEvent::job_finished(self.id, index, &result));
            self.snapshot.send_modify(|s| s.record(index, result));
        }

        let cancelled = self.cancel.is_cancelled();
        self.snapshot.send_modify(|s| s.finish(cancelled));
        let snapshot = self.snapshot.borrow().clone();

        if permit.is_some() && (setup_error.is_some() || snapshot.succeeded() == 0) {
            // Nothing worth keeping in an empty batch directory.
            let _ = tokio::fs::remove_dir(&self.output_dir).await;
        }

        info!(
            "Batch {} {}: {}/{} succeeded",
            self.id,
            if cancelled { "cancelled" } else { "completed" },
            snapshot.succeeded(),
            snapshot.total()
        );
        self.emitter.send(AppEvent::batch_completed(&snapshot));

        if let Some(workspace) = self.workspace.take() {
            release_workspace(workspace, self.orchestrator.config.keep_uploads).await;
        }

        drop(permit);
    }

    async fn run_job(
        &self,
        index: usize,
        job: ConversionJob,
        namer: &mut OutputNamer,
    ) -> JobResult {
        let name = job.display_name.clone();

        if !job.input_path.is_file() {
            warn!("Input file does not exist: {:?}", job.input_path);
            return JobResult::failed(job, format!("Input file does not exist: {}", name), None);
        }
        if !is_video_file(&job.input_path) && !is_video_file(Path::new(&name)) {
            warn!("Skipping non-video input: {}", name);
            return JobResult::failed(job, format!("Not a supported video file: {}", name), None);
        }

        let settings = job.settings;
        let output = namer.next(&name, settings.output_format);
        let started_at = Utc::now();
        let config = &self.orchestrator.config;

        let mut choice = config
            .hardware
            .initial_choice(settings.codec, settings.use_gpu);
        if settings.use_gpu && !choice.is_hardware() {
            debug!("No hardware encoder for {}, using software for {}", settings.codec, name);
        }
        let mut gpu_fallback = false;

        loop {
            let encoder = encoder_name(settings.codec, choice);
            info!("Converting {} -> {:?} with {}", name, output, encoder);

            self.snapshot.send_modify(|s| s.start_job(index, &encoder));
            self.emitter
                .send(AppEvent::job_started(self.id, job.id, index, &name, &encoder));

            let args = build_args(&job.input_path, &output, &settings, choice, &config.encode);
            let (failure, exit_code) = match self.attempt(index, &job, &args).await {
                Ok(outcome) if outcome.is_success() => {
                    if output.is_file() {
                        info!("Converted {} -> {:?}", name, output);
                        return JobResult::succeeded(job, output, started_at)
                            .with_encoder(encoder)
                            .with_gpu_fallback(gpu_fallback);
                    }
                    (
                        "ffmpeg reported success but produced no output file".to_string(),
                        Some(0),
                    )
                }
                Ok(outcome) => (outcome.error_message(), outcome.exit_code),
                Err(e) if e.is_cancelled() => {
                    remove_partial(&output).await;
                    info!("Conversion of {} cancelled", name);
                    return JobResult::cancelled(job, Some(started_at))
                        .with_encoder(encoder)
                        .with_gpu_fallback(gpu_fallback);
                }
                Err(e) => (e.to_string(), None),
            };

            remove_partial(&output).await;

            if let EncoderChoice::Hardware(backend) = choice {
                if self.cancel.is_cancelled() {
                    return JobResult::cancelled(job, Some(started_at)).with_encoder(encoder);
                }
                warn!(
                    "{} encoder failed for {}, retrying with software encoder: {}",
                    backend,
                    name,
                    failure.lines().last().unwrap_or_default()
                );
                choice = EncoderChoice::Software;
                gpu_fallback = true;
                continue;
            }

            warn!("Conversion of {} failed: {}", name, failure);
            return JobResult::failed(job, failure, Some(started_at))
                .with_exit_code(exit_code)
                .with_encoder(encoder)
                .with_gpu_fallback(gpu_fallback);
        }
    }

    async fn attempt(
        &self,
        index: usize,
        job: &ConversionJob,
        args: &[String],
    ) -> vidbatch_av::Result<super::TranscodeOutcome> {
        let batch_id = self.id;
        let job_id = job.id;
        let snapshot = &self.snapshot;
        let emitter = &self.emitter;

        let progress = move |pct: f32| {
            let mut overall = 0.0;
            snapshot.send_modify(|s| {
                s.update_progress(index, pct);
                overall = s.progress;
            });
            emitter.send(AppEvent::job_progress(batch_id, job_id, index, pct, overall));
        };

        debug!(
            "{} {}",
            self.orchestrator.transcoder.name(),
            args.join(" ")
        );
        self.orchestrator
            .transcoder
            .run(args, &progress, &self.cancel)
            .await
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}

async fn release_workspace(workspace: Workspace, keep: bool) {
    if keep {
        let path = workspace.keep();
        info!("Keeping uploaded files in {:?}", path);
        return;
    }

    let path = workspace.path().to_path_buf();
    match tokio::task::spawn_blocking(move || workspace.cleanup()).await {
        Ok(Ok(())) => debug!("Removed upload workspace {:?}", path),
        Ok(Err(e)) => warn!("Failed to remove upload workspace {:?}: {}", path, e),
        Err(e) => warn!("Upload cleanup task failed: {}", e),
    }
}
