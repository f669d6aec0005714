//! Translation of conversion settings into an ffmpeg argument list.
//!
//! Arguments are emitted in a fixed order:
//!
//! ```text
//! -hide_banner -nostdin -y [-hwaccel X] -i <input> <codec> [-vf scale=W:H] [-r FPS] <rate> -f <muxer> <output>
//! ```

use super::settings::{BitrateMode, ConversionSettings, OutputFormat, VideoCodec};
use crate::config::ConversionConfig;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use vidbatch_av::HwBackend;

/// Which encoder an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderChoice {
    Software,
    Hardware(HwBackend),
}

impl EncoderChoice {
    pub fn is_hardware(&self) -> bool {
        matches!(self, EncoderChoice::Hardware(_))
    }
}

/// Encoder tuning that comes from configuration rather than the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Constant-quality value used when the bitrate is automatic.
    pub quality: u32,
    pub x264_preset: String,
    pub x265_preset: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 23,
            x264_preset: "medium".to_string(),
            x265_preset: "medium".to_string(),
        }
    }
}

impl From<&ConversionConfig> for EncodeOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            quality: config.quality,
            x264_preset: config.x264_preset.clone(),
            x265_preset: config.x265_preset.clone(),
        }
    }
}

/// Encoder name for `codec` under `choice`.
///
/// Codecs without a hardware variant always use their software encoder.
pub fn encoder_name(codec: VideoCodec, choice: EncoderChoice) -> String {
    match (choice, codec.hardware_family()) {
        (EncoderChoice::Hardware(backend), Some(family)) => backend.encoder_for(family),
        _ => codec.software_encoder().to_string(),
    }
}

/// Build the complete ffmpeg argument list (program name excluded).
pub fn build_args(
    input: &Path,
    output: &Path,
    settings: &ConversionSettings,
    choice: EncoderChoice,
    options: &EncodeOptions,
) -> Vec<String> {
    let codec = settings.codec;
    let hardware = match (choice, codec.hardware_family()) {
        (EncoderChoice::Hardware(backend), Some(_)) => Some(backend),
        _ => None,
    };

    let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

    if let Some(backend) = hardware {
        args.extend(["-hwaccel".into(), backend.hwaccel().into()]);
    }

    args.extend(["-i".into(), input.to_string_lossy().to_string()]);

    // Codec
    let encoder = encoder_name(codec, choice);
    args.extend(["-c:v".into(), encoder]);
    if hardware.is_none() {
        match codec {
            VideoCodec::H264 => args.extend(["-preset".into(), options.x264_preset.clone()]),
            VideoCodec::Hevc => args.extend(["-preset".into(), options.x265_preset.clone()]),
            _ => {}
        }
    }
    if let Some(profile) = codec.prores_profile() {
        args.extend(["-profile:v".into(), profile.to_string()]);
    }

    if let Some(filter) = settings.resolution.scale_filter() {
        args.extend(["-vf".into(), filter]);
    }

    if let Some(rate) = settings.frame_rate.rate_arg() {
        args.extend(["-r".into(), rate]);
    }

    // Rate control
    match settings.bitrate {
        BitrateMode::Manual(bitrate) => {
            args.extend(["-b:v".into(), bitrate.to_string()]);
        }
        BitrateMode::Auto => {
            if let Some(flag) = quality_flag(codec, hardware) {
                args.extend([flag.into(), options.quality.to_string()]);
            }
        }
    }

    args.extend(["-f".into(), settings.output_format.muxer().into()]);
    args.push(output.to_string_lossy().to_string());

    args
}

/// Constant-quality option for encoders that have one.
fn quality_flag(codec: VideoCodec, hardware: Option<HwBackend>) -> Option<&'static str> {
    match (hardware, codec) {
        (None, VideoCodec::H264 | VideoCodec::Hevc) => Some("-crf"),
        (Some(HwBackend::Nvenc), _) => Some("-cq"),
        (Some(HwBackend::Qsv), _) => Some("-global_quality"),
        _ => None,
    }
}

/// `<stem>.<ext>` for a display name such as `clip.mov`.
pub fn output_file_name(input_name: &str, format: OutputFormat) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("output");
    let stem = vidbatch_common::paths::sanitize_file_name(stem).unwrap_or_else(|| "output".into());
    format!("{}.{}", stem, format.extension())
}

/// Hands out unique output paths inside one batch directory.
///
/// The second `clip` becomes `clip_1`, the third `clip_2` and so on.
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    used: HashSet<String>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            used: HashSet::new(),
        }
    }

    pub fn next(&mut self, input_name: &str, format: OutputFormat) -> PathBuf {
        let file_name = output_file_name(input_name, format);
        let stem = file_name
            .strip_suffix(&format!(".{}", format.extension()))
            .unwrap_or(&file_name)
            .to_string();

        let mut candidate = file_name;
        let mut n = 1;
        while self.used.contains(&candidate.to_lowercase()) || self.dir.join(&candidate).exists() {
            candidate = format!("{}_{}.{}", stem, n, format.extension());
            n += 1;
        }

        self.used.insert(candidate.to_lowercase());
        self.dir.join(candidate)
    }
}
