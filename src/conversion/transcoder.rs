//! The seam between the orchestrator and the external encoder.

use super::command::EncoderChoice;
use super::settings::VideoCodec;
use crate::config::HardwareMode;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use vidbatch_av::{EncoderSet, HwBackend, TranscodeCommand};

/// Exit information from one encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Trailing diagnostic lines, oldest first.
    pub diagnostics: Vec<String>,
}

impl TranscodeOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(exit_code: i32, diagnostics: Vec<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            diagnostics,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Error text for a failed run.
    pub fn error_message(&self) -> String {
        let head = match self.exit_code {
            Some(code) => format!("ffmpeg exited with code {}", code),
            None => "ffmpeg was terminated by a signal".to_string(),
        };
        if self.diagnostics.is_empty() {
            head
        } else {
            format!("{}\n{}", head, self.diagnostics.join("\n"))
        }
    }
}

/// Runs one encoder invocation.
///
/// `args` excludes the program name. `progress` receives percentages in
/// `[0, 100]`. Implementations must stop promptly and return
/// [`vidbatch_av::Error::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn run(
        &self,
        args: &[String],
        progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> vidbatch_av::Result<TranscodeOutcome>;
}

/// Production transcoder that spawns ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(
        &self,
        args: &[String],
        progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> vidbatch_av::Result<TranscodeOutcome> {
        let mut command = TranscodeCommand::new(self.ffmpeg.clone());
        command.args(args.iter().cloned());

        let output = command.execute(|pct| progress(pct), cancel).await?;

        tracing::debug!(
            "ffmpeg finished in {:.1}s (media duration {:?})",
            output.elapsed.as_secs_f64(),
            output.media_duration
        );

        Ok(TranscodeOutcome {
            exit_code: output.exit_code(),
            diagnostics: output.diagnostics,
        })
    }
}

/// Hardware encoders this ffmpeg build offers, filtered by configuration.
#[derive(Debug, Clone, Default)]
pub struct HardwareSupport {
    encoders: EncoderSet,
    disabled: bool,
    preferred: Option<HwBackend>,
}

impl HardwareSupport {
    pub fn new(encoders: EncoderSet, mode: HardwareMode) -> Self {
        let (disabled, preferred) = match mode {
            HardwareMode::Auto => (false, None),
            HardwareMode::Disabled => (true, None),
            HardwareMode::Only(backend) => (false, Some(backend)),
        };
        Self {
            encoders,
            disabled,
            preferred,
        }
    }

    /// No hardware encoders at all.
    pub fn none() -> Self {
        Self::new(EncoderSet::default(), HardwareMode::Disabled)
    }

    /// Backend to try first for `codec`, if any.
    pub fn backend_for(&self, codec: VideoCodec) -> Option<HwBackend> {
        if self.disabled {
            return None;
        }
        let family = codec.hardware_family()?;
        self.encoders
            .hardware_encoder(family, self.preferred)
            .map(|(backend, _)| backend)
    }

    /// First attempt for a job.
    pub fn initial_choice(&self, codec: VideoCodec, use_gpu: bool) -> EncoderChoice {
        match use_gpu.then(|| self.backend_for(codec)).flatten() {
            Some(backend) => EncoderChoice::Hardware(backend),
            None => EncoderChoice::Software,
        }
    }

    /// Backends usable for at least one codec.
    pub fn backends(&self) -> Vec<HwBackend> {
        if self.disabled {
            return Vec::new();
        }
        self.encoders
            .hardware_backends(&["h264", "hevc"])
            .into_iter()
            .filter(|b| self.preferred.map_or(true, |p| p == *b))
            .collect()
    }

    pub fn available(&self) -> bool {
        !self.backends().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvenc_and_qsv() -> EncoderSet {
        EncoderSet::from_names(["libx264", "h264_nvenc", "hevc_nvenc", "h264_qsv"])
    }

    #[test]
    fn test_auto_prefers_first_backend() {
        let hw = HardwareSupport::new(nvenc_and_qsv(), HardwareMode::Auto);
        assert_eq!(hw.backend_for(VideoCodec::H264), Some(HwBackend::Nvenc));
        assert_eq!(hw.backends(), vec![HwBackend::Nvenc, HwBackend::Qsv]);
        assert!(hw.available());
    }

    #[test]
    fn test_only_backend() {
        let hw = HardwareSupport::new(nvenc_and_qsv(), HardwareMode::Only(HwBackend::Qsv));
        assert_eq!(hw.backend_for(VideoCodec::H264), Some(HwBackend::Qsv));
        assert_eq!(hw.backend_for(VideoCodec::Hevc), None);
        assert_eq!(hw.backends(), vec![HwBackend::Qsv]);
    }

    #[test]
    fn test_disabled_and_software_codecs() {
        let hw = HardwareSupport::new(nvenc_and_qsv(), HardwareMode::Disabled);
        assert_eq!(hw.backend_for(VideoCodec::H264), None);
        assert!(!hw.available());

        let hw = HardwareSupport::new(nvenc_and_qsv(), HardwareMode::Auto);
        assert_eq!(hw.backend_for(VideoCodec::ProResHq), None);
    }

    #[test]
    fn test_initial_choice_requires_gpu_request() {
        let hw = HardwareSupport::new(nvenc_and_qsv(), HardwareMode::Auto);
        assert_eq!(
            hw.initial_choice(VideoCodec::H264, true),
            EncoderChoice::Hardware(HwBackend::Nvenc)
        );
        assert_eq!(hw.initial_choice(VideoCodec::H264, false), EncoderChoice::Software);
        assert_eq!(
            HardwareSupport::none().initial_choice(VideoCodec::H264, true),
            EncoderChoice::Software
        );
    }

    #[test]
    fn test_outcome_error_message() {
        let outcome = TranscodeOutcome::failure(1, vec!["Invalid data found".into()]);
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.error_message(),
            "ffmpeg exited with code 1\nInvalid data found"
        );
        assert!(TranscodeOutcome::success().is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ffmpeg_transcoder_reports_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '  Duration: 00:00:10.00, start: 0' >&2\necho 'frame=1 time=00:00:05.00 bitrate=1k' >&2\necho 'Conversion failed!' >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let seen = std::sync::Mutex::new(Vec::<f32>::new());
        let transcoder = FfmpegTranscoder::new(script);
        let outcome = transcoder
            .run(
                &["-i".to_string(), "x".to_string()],
                &|pct: f32| seen.lock().unwrap().push(pct),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.error_message().contains("Conversion failed!"));
        assert_eq!(*seen.lock().unwrap(), vec![50.0]);
    }
}
