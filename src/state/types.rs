use crate::conversion::{ConversionJob, JobResult, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidbatch_common::{BatchId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Waiting for an earlier batch to finish.
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

/// Live view of one job inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: JobId,
    pub input_name: String,
    pub status: JobStatus,
    pub progress: f32,
    pub encoder: Option<String>,
}

/// Polling view of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub id: BatchId,
    pub status: BatchStatus,
    pub jobs: Vec<JobEntry>,
    /// Results so far, in submission order.
    pub results: Vec<JobResult>,
    /// Index of the job currently running.
    pub current: Option<usize>,
    /// Overall completion in `[0, 100]`.
    pub progress: f32,
    pub output_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchSnapshot {
    pub fn new(id: BatchId, jobs: &[ConversionJob], output_dir: PathBuf) -> Self {
        Self {
            id,
            status: BatchStatus::Pending,
            jobs: jobs
                .iter()
                .map(|job| JobEntry {
                    id: job.id,
                    input_name: job.display_name.clone(),
                    status: JobStatus::Pending,
                    progress: 0.0,
                    encoder: None,
                })
                .collect(),
            results: Vec::with_capacity(jobs.len()),
            current: None,
            progress: 0.0,
            output_dir,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = BatchStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn start_job(&mut self, index: usize, encoder: &str) {
        self.current = Some(index);
        if let Some(entry) = self.jobs.get_mut(index) {
            entry.status = JobStatus::Running;
            entry.progress = 0.0;
            entry.encoder = Some(encoder.to_string());
        }
        self.recompute_progress();
    }

    pub fn update_progress(&mut self, index: usize, progress: f32) {
        if let Some(entry) = self.jobs.get_mut(index) {
            entry.progress = progress.clamp(0.0, 100.0);
        }
        self.recompute_progress();
    }

    /// Record a finished job. Results must arrive in submission order.
    pub fn record(&mut self, index: usize, result: JobResult) {
        if let Some(entry) = self.jobs.get_mut(index) {
            entry.status = result.status;
            entry.progress = if result.is_success() { 100.0 } else { entry.progress };
            if result.encoder.is_some() {
                entry.encoder = result.encoder.clone();
            }
        }
        if self.current == Some(index) {
            self.current = None;
        }
        self.results.push(result);
        self.recompute_progress();
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.status = if cancelled {
            BatchStatus::Cancelled
        } else {
            BatchStatus::Completed
        };
        self.current = None;
        self.completed_at = Some(Utc::now());
        self.progress = 100.0;
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Human-readable status text.
    pub fn report(&self) -> String {
        let mut report = format!(
            "Conversion completed: {}/{} files converted successfully",
            self.succeeded(),
            self.total()
        );
        if !self.results.is_empty() {
            report.push_str("\n\n");
            let lines: Vec<String> = self.results.iter().map(JobResult::summary_line).collect();
            report.push_str(&lines.join("\n"));
        }
        report
    }

    fn recompute_progress(&mut self) {
        if self.jobs.is_empty() {
            self.progress = 0.0;
            return;
        }
        // Finished jobs count in full, whatever their outcome.
        let done: f32 = self
            .jobs
            .iter()
            .map(|j| {
                if j.status.is_finished() {
                    100.0
                } else {
                    j.progress
                }
            })
            .sum();
        self.progress = (done / self.jobs.len() as f32).clamp(0.0, 100.0);
    }
}

/// Counters over the batches still held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub batches: u64,
    pub active: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub gpu_fallbacks: u64,
}

impl BatchStats {
    pub fn record(&mut self, snapshot: &BatchSnapshot) {
        self.batches += 1;
        if !snapshot.is_finished() {
            self.active += 1;
        }
        for result in &snapshot.results {
            if result.is_success() {
                self.jobs_succeeded += 1;
            } else {
                self.jobs_failed += 1;
            }
            if result.gpu_fallback {
                self.gpu_fallbacks += 1;
            }
        }
    }

    pub fn success_rate(&self) -> f32 {
        let total = self.jobs_succeeded + self.jobs_failed;
        if total == 0 {
            return 0.0;
        }
        (self.jobs_succeeded as f32 / total as f32) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionSettings;

    fn jobs(names: &[&str]) -> Vec<ConversionJob> {
        names
            .iter()
            .map(|n| ConversionJob::new(PathBuf::from(n), ConversionSettings::default()))
            .collect()
    }

    #[test]
    fn test_progress_counts_finished_jobs() {
        let jobs = jobs(&["a.mov", "b.mov"]);
        let mut snapshot = BatchSnapshot::new(BatchId::new(), &jobs, PathBuf::from("out"));
        snapshot.start();
        snapshot.start_job(0, "libx264");
        snapshot.update_progress(0, 50.0);
        assert_eq!(snapshot.progress, 25.0);

        snapshot.record(0, JobResult::failed(jobs[0].clone(), "boom", None));
        assert_eq!(snapshot.progress, 50.0);
        assert_eq!(snapshot.current, None);

        snapshot.start_job(1, "libx264");
        snapshot.record(
            1,
            JobResult::succeeded(jobs[1].clone(), PathBuf::from("out/b.mp4"), Utc::now()),
        );
        assert_eq!(snapshot.progress, 100.0);
        assert_eq!(snapshot.succeeded(), 1);
        assert_eq!(snapshot.failed(), 1);
    }

    #[test]
    fn test_report() {
        let jobs = jobs(&["a.mov", "b.mov"]);
        let mut snapshot = BatchSnapshot::new(BatchId::new(), &jobs, PathBuf::from("out"));
        snapshot.record(
            0,
            JobResult::succeeded(jobs[0].clone(), PathBuf::from("out/a.mp4"), Utc::now()),
        );
        snapshot.record(1, JobResult::failed(jobs[1].clone(), "bad input", None));
        snapshot.finish(false);

        assert_eq!(
            snapshot.report(),
            "Conversion completed: 1/2 files converted successfully\n\n\
             Successfully converted: a.mp4\n\
             Error converting b.mov: bad input"
        );
        assert_eq!(snapshot.status, BatchStatus::Completed);
    }

    #[test]
    fn test_stats() {
        let jobs = jobs(&["a.mov"]);
        let mut snapshot = BatchSnapshot::new(BatchId::new(), &jobs, PathBuf::from("out"));
        snapshot.record(
            0,
            JobResult::succeeded(jobs[0].clone(), PathBuf::from("out/a.mp4"), Utc::now())
                .with_gpu_fallback(true),
        );
        snapshot.finish(false);

        let mut stats = BatchStats::default();
        stats.record(&snapshot);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.jobs_succeeded, 1);
        assert_eq!(stats.gpu_fallbacks, 1);
        assert_eq!(stats.success_rate(), 100.0);
    }
}
