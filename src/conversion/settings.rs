//! User-facing conversion options.
//!
//! Every option parses leniently from the labels shown in the UI as well as
//! short aliases, so the same values work from the web form, the JSON API and
//! config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vidbatch_common::{Error, Result};

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    Mp4,
    Mkv,
    Avi,
    Mov,
    Wmv,
    Flv,
    Mpeg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Mp4,
        OutputFormat::Mkv,
        OutputFormat::Avi,
        OutputFormat::Mov,
        OutputFormat::Wmv,
        OutputFormat::Flv,
        OutputFormat::Mpeg,
    ];

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
            OutputFormat::Wmv => "wmv",
            OutputFormat::Flv => "flv",
            OutputFormat::Mpeg => "mpeg",
        }
    }

    /// ffmpeg muxer passed to `-f`.
    pub fn muxer(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "matroska",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
            OutputFormat::Wmv => "asf",
            OutputFormat::Flv => "flv",
            OutputFormat::Mpeg => "mpeg",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "MP4",
            OutputFormat::Mkv => "MKV",
            OutputFormat::Avi => "AVI",
            OutputFormat::Mov => "MOV",
            OutputFormat::Wmv => "WMV",
            OutputFormat::Flv => "FLV",
            OutputFormat::Mpeg => "MPEG",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('.').to_lowercase();
        match s.as_str() {
            "mp4" | "m4v" => Ok(OutputFormat::Mp4),
            "mkv" | "matroska" => Ok(OutputFormat::Mkv),
            "avi" => Ok(OutputFormat::Avi),
            "mov" | "quicktime" => Ok(OutputFormat::Mov),
            "wmv" | "asf" => Ok(OutputFormat::Wmv),
            "flv" => Ok(OutputFormat::Flv),
            "mpeg" | "mpg" => Ok(OutputFormat::Mpeg),
            _ => Err(Error::invalid_input(format!("Unsupported output format: {}", s))),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.label().to_string()
    }
}

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VideoCodec {
    H264,
    Hevc,
    Mpeg4,
    Mpeg2,
    ProResProxy,
    ProResLight,
    ProResStandard,
    ProResHq,
}

impl VideoCodec {
    pub const ALL: [VideoCodec; 8] = [
        VideoCodec::H264,
        VideoCodec::Hevc,
        VideoCodec::Mpeg4,
        VideoCodec::Mpeg2,
        VideoCodec::ProResProxy,
        VideoCodec::ProResLight,
        VideoCodec::ProResStandard,
        VideoCodec::ProResHq,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H.264",
            VideoCodec::Hevc => "HEVC (H.265)",
            VideoCodec::Mpeg4 => "MPEG-4 (Part 2)",
            VideoCodec::Mpeg2 => "MPEG-2",
            VideoCodec::ProResProxy => "ProRes Proxy",
            VideoCodec::ProResLight => "ProRes Light",
            VideoCodec::ProResStandard => "ProRes Standard",
            VideoCodec::ProResHq => "ProRes HQ",
        }
    }

    /// Software encoder name.
    pub fn software_encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Hevc => "libx265",
            VideoCodec::Mpeg4 => "mpeg4",
            VideoCodec::Mpeg2 => "mpeg2video",
            VideoCodec::ProResProxy
            | VideoCodec::ProResLight
            | VideoCodec::ProResStandard
            | VideoCodec::ProResHq => "prores_ks",
        }
    }

    /// Codec family used to name hardware encoders, if any exist for it.
    pub fn hardware_family(&self) -> Option<&'static str> {
        match self {
            VideoCodec::H264 => Some("h264"),
            VideoCodec::Hevc => Some("hevc"),
            _ => None,
        }
    }

    /// `prores_ks` profile number.
    pub fn prores_profile(&self) -> Option<u8> {
        match self {
            VideoCodec::ProResProxy => Some(0),
            VideoCodec::ProResLight => Some(1),
            VideoCodec::ProResStandard => Some(2),
            VideoCodec::ProResHq => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VideoCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "h264" | "avc" | "x264" => Ok(VideoCodec::H264),
            "hevc" | "hevch265" | "h265" | "x265" => Ok(VideoCodec::Hevc),
            "mpeg4" | "mpeg4part2" | "xvid" => Ok(VideoCodec::Mpeg4),
            "mpeg2" | "mpeg2video" => Ok(VideoCodec::Mpeg2),
            "proresproxy" => Ok(VideoCodec::ProResProxy),
            "proreslight" | "proreslt" => Ok(VideoCodec::ProResLight),
            "proresstandard" | "prores" => Ok(VideoCodec::ProResStandard),
            "proreshq" => Ok(VideoCodec::ProResHq),
            _ => Err(Error::invalid_input(format!("Unsupported codec: {}", s.trim()))),
        }
    }
}

impl TryFrom<String> for VideoCodec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VideoCodec> for String {
    fn from(value: VideoCodec) -> Self {
        value.label().to_string()
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    #[default]
    SameAsInput,
    Fixed { width: u32, height: u32 },
}

impl Resolution {
    /// UI presets with their labels.
    pub const PRESETS: [(&'static str, u32, u32); 5] = [
        ("4K", 3840, 2160),
        ("1440p", 2560, 1440),
        ("1080p", 1920, 1080),
        ("720p", 1280, 720),
        ("480p", 854, 480),
    ];

    pub fn fixed(width: u32, height: u32) -> Self {
        Resolution::Fixed { width, height }
    }

    /// Value for ffmpeg's `scale` filter, `None` when unchanged.
    pub fn scale_filter(&self) -> Option<String> {
        match self {
            Resolution::SameAsInput => None,
            Resolution::Fixed { width, height } => Some(format!("scale={}:{}", width, height)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::SameAsInput => f.write_str("Same as input"),
            Resolution::Fixed { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();
        if lower.is_empty() || lower == "same as input" || lower == "same" || lower == "source" {
            return Ok(Resolution::SameAsInput);
        }

        if let Some((_, w, h)) = Self::PRESETS
            .iter()
            .find(|(label, _, _)| label.eq_ignore_ascii_case(&lower))
        {
            return Ok(Resolution::fixed(*w, *h));
        }

        // "1920x1080" or "1920x1080 (1080p)"
        let dims = lower.split_whitespace().next().unwrap_or_default();
        let invalid = || Error::invalid_input(format!("Invalid resolution: {}", trimmed));
        let (w, h) = dims.split_once(['x', ':']).ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Resolution::fixed(width, height))
    }
}

impl TryFrom<String> for Resolution {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Unit for a manual bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitrateUnit {
    #[serde(rename = "kbps", alias = "k")]
    Kbps,
    #[default]
    #[serde(rename = "Mbps", alias = "M")]
    Mbps,
}

impl BitrateUnit {
    pub fn suffix(&self) -> char {
        match self {
            BitrateUnit::Kbps => 'k',
            BitrateUnit::Mbps => 'M',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BitrateUnit::Kbps => "kbps",
            BitrateUnit::Mbps => "Mbps",
        }
    }
}

impl FromStr for BitrateUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "k" | "K" | "kbps" | "Kbps" | "kb/s" => Ok(BitrateUnit::Kbps),
            "M" | "m" | "Mbps" | "mbps" | "Mb/s" => Ok(BitrateUnit::Mbps),
            other => Err(Error::invalid_input(format!("Invalid bitrate unit: {}", other))),
        }
    }
}

/// A manual bitrate such as `4000k` or `8M`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBitrate")]
pub struct Bitrate {
    pub value: f64,
    pub unit: BitrateUnit,
}

#[derive(Deserialize)]
struct RawBitrate {
    value: f64,
    #[serde(default)]
    unit: BitrateUnit,
}

impl TryFrom<RawBitrate> for Bitrate {
    type Error = Error;

    fn try_from(raw: RawBitrate) -> Result<Self> {
        Bitrate::new(raw.value, raw.unit)
    }
}

impl Bitrate {
    pub fn new(value: f64, unit: BitrateUnit) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::invalid_input(format!(
                "Invalid bitrate value: {}",
                value
            )));
        }
        Ok(Self { value, unit })
    }

    pub fn kbps(value: f64) -> Result<Self> {
        Self::new(value, BitrateUnit::Kbps)
    }

    pub fn mbps(value: f64) -> Result<Self> {
        Self::new(value, BitrateUnit::Mbps)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Rate control choice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitrateMode {
    /// Let the encoder pick (constant quality where supported).
    #[default]
    Auto,
    Manual(Bitrate),
}

impl BitrateMode {
    /// Build from the form's text field and unit selector.
    ///
    /// An empty field or `auto` means automatic.
    pub fn from_input(value: &str, unit: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            return Ok(BitrateMode::Auto);
        }
        let number: f64 = value.parse().map_err(|_| {
            Error::invalid_input(format!(
                "Invalid bitrate value: {}. Please enter a numeric value.",
                value
            ))
        })?;
        let unit: BitrateUnit = unit.parse()?;
        Ok(BitrateMode::Manual(Bitrate::new(number, unit)?))
    }

    pub fn bitrate(&self) -> Option<&Bitrate> {
        match self {
            BitrateMode::Auto => None,
            BitrateMode::Manual(bitrate) => Some(bitrate),
        }
    }
}

/// Output frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FrameRate {
    #[default]
    SameAsSource,
    Fixed(f64),
}

impl FrameRate {
    pub const PRESETS: [&'static str; 6] = ["23.97", "24", "25", "29.97", "30", "60"];

    /// Value for `-r`, `None` when unchanged.
    pub fn rate_arg(&self) -> Option<String> {
        match self {
            FrameRate::SameAsSource => None,
            FrameRate::Fixed(fps) => Some(fps.to_string()),
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameRate::SameAsSource => f.write_str("Same as input"),
            FrameRate::Fixed(fps) => write!(f, "{}", fps),
        }
    }
}

impl FromStr for FrameRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();
        if lower.is_empty()
            || lower == "same as input"
            || lower == "same as source"
            || lower == "same"
            || lower == "source"
        {
            return Ok(FrameRate::SameAsSource);
        }
        let number = lower.trim_end_matches("fps").trim();
        match number.parse::<f64>() {
            Ok(fps) if fps.is_finite() && fps > 0.0 => Ok(FrameRate::Fixed(fps)),
            _ => Err(Error::invalid_input(format!("Invalid frame rate: {}", trimmed))),
        }
    }
}

impl TryFrom<String> for FrameRate {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FrameRate> for String {
    fn from(value: FrameRate) -> Self {
        value.to_string()
    }
}

/// One batch's shared settings. Copied into every job at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub output_format: OutputFormat,
    pub codec: VideoCodec,
    pub resolution: Resolution,
    pub bitrate: BitrateMode,
    pub frame_rate: FrameRate,
    pub use_gpu: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Mp4,
            codec: VideoCodec::H264,
            resolution: Resolution::SameAsInput,
            bitrate: BitrateMode::Auto,
            frame_rate: FrameRate::SameAsSource,
            use_gpu: false,
        }
    }
}

/// Raw string fields as submitted by the web form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsForm {
    pub output_format: Option<String>,
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub bitrate_unit: Option<String>,
    pub fps: Option<String>,
    pub use_gpu: Option<String>,
}

impl SettingsForm {
    /// Set a field by its form name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "output_format" | "format" => &mut self.output_format,
            "codec" => &mut self.codec,
            "resolution" => &mut self.resolution,
            "bitrate" => &mut self.bitrate,
            "bitrate_unit" => &mut self.bitrate_unit,
            "fps" | "frame_rate" => &mut self.fps,
            "use_gpu" | "gpu" => &mut self.use_gpu,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Validate every field, filling in defaults for missing ones.
    pub fn into_settings(self) -> Result<ConversionSettings> {
        let defaults = ConversionSettings::default();

        let output_format = match self.output_format.as_deref() {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => defaults.output_format,
        };
        let codec = match self.codec.as_deref() {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => defaults.codec,
        };
        let resolution = match self.resolution.as_deref() {
            Some(v) => v.parse()?,
            None => defaults.resolution,
        };
        let bitrate = BitrateMode::from_input(
            self.bitrate.as_deref().unwrap_or_default(),
            self.bitrate_unit.as_deref().unwrap_or("Mbps"),
        )?;
        let frame_rate = match self.fps.as_deref() {
            Some(v) => v.parse()?,
            None => defaults.frame_rate,
        };
        let use_gpu = matches!(
            self.use_gpu.as_deref().map(|v| v.trim().to_lowercase()).as_deref(),
            Some("true" | "on" | "1" | "yes")
        );

        Ok(ConversionSettings {
            output_format,
            codec,
            resolution,
            bitrate,
            frame_rate,
            use_gpu,
        })
    }
}
