use super::settings::ConversionSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vidbatch_common::JobId;

/// One input file with the batch's settings attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    pub input_path: PathBuf,
    /// Name shown to the user; the original upload name for staged files.
    pub display_name: String,
    #[serde(flatten)]
    pub settings: ConversionSettings,
}

impl ConversionJob {
    pub fn new(input_path: PathBuf, settings: ConversionSettings) -> Self {
        let display_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input_path.to_string_lossy().to_string());

        Self::with_display_name(input_path, display_name, settings)
    }

    pub fn with_display_name(
        input_path: PathBuf,
        display_name: impl Into<String>,
        settings: ConversionSettings,
    ) -> Self {
        Self {
            id: JobId::new(),
            input_path,
            display_name: display_name.into(),
            settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Error text recorded for jobs stopped by a cancel request.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Outcome of one job. `output_path` is set only for succeeded jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job: ConversionJob,
    pub status: JobStatus,
    pub output_path: Option<PathBuf>,
    pub exit_code: Option<i32>,
    /// Wall-clock seconds spent on the job, fallback attempt included.
    pub duration_secs: f64,
    pub error: Option<String>,
    /// Encoder used by the final attempt.
    pub encoder: Option<String>,
    /// A hardware attempt failed and the job was rerun in software.
    pub gpu_fallback: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn succeeded(job: ConversionJob, output_path: PathBuf, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            job,
            status: JobStatus::Succeeded,
            output_path: Some(output_path),
            exit_code: Some(0),
            duration_secs: elapsed_secs(started_at, completed_at),
            error: None,
            encoder: None,
            gpu_fallback: false,
            started_at: Some(started_at),
            completed_at,
        }
    }

    /// A failure. `started_at` is `None` when ffmpeg never ran.
    pub fn failed(
        job: ConversionJob,
        error: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            job,
            status: JobStatus::Failed,
            output_path: None,
            exit_code: None,
            duration_secs: started_at
                .map(|s| elapsed_secs(s, completed_at))
                .unwrap_or_default(),
            error: Some(error.into()),
            encoder: None,
            gpu_fallback: false,
            started_at,
            completed_at,
        }
    }

    pub fn cancelled(job: ConversionJob, started_at: Option<DateTime<Utc>>) -> Self {
        Self::failed(job, CANCELLED_MESSAGE, started_at)
    }

    pub fn with_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.encoder = Some(encoder.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_gpu_fallback(mut self, gpu_fallback: bool) -> Self {
        self.gpu_fallback = gpu_fallback;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == JobStatus::Failed && self.error.as_deref() == Some(CANCELLED_MESSAGE)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }

    /// One-line summary for the status report.
    pub fn summary_line(&self) -> String {
        match (&self.status, &self.output_path) {
            (JobStatus::Succeeded, Some(path)) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if self.gpu_fallback {
                    format!("Successfully converted: {} (software fallback)", name)
                } else {
                    format!("Successfully converted: {}", name)
                }
            }
            _ => format!(
                "Error converting {}: {}",
                self.job.display_name,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}
