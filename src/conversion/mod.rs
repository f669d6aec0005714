//! Batch video conversion.
//!
//! - [`settings`]: the user's choices (format, codec, size, bitrate, frame rate)
//! - [`command`]: translation of those choices into ffmpeg arguments
//! - [`transcoder`]: the process seam and hardware encoder selection
//! - [`orchestrator`]: sequencing of jobs, GPU fallback and cancellation

pub mod command;
mod job;
pub mod orchestrator;
pub mod settings;
pub mod transcoder;

pub use command::{build_args, EncodeOptions, EncoderChoice, OutputNamer};
pub use job::{ConversionJob, JobResult, JobStatus, CANCELLED_MESSAGE};
pub use orchestrator::{BatchHandle, Orchestrator, OrchestratorConfig};
pub use settings::{
    Bitrate, BitrateMode, BitrateUnit, ConversionSettings, FrameRate, OutputFormat, Resolution,
    SettingsForm, VideoCodec,
};
pub use transcoder::{FfmpegTranscoder, HardwareSupport, TranscodeOutcome, Transcoder};

use std::path::PathBuf;

/// One job per input path, all sharing `settings`.
pub fn jobs_from_paths<I>(inputs: I, settings: ConversionSettings) -> Vec<ConversionJob>
where
    I: IntoIterator<Item = PathBuf>,
{
    inputs
        .into_iter()
        .map(|path| ConversionJob::new(path, settings))
        .collect()
}
