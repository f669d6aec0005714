use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidbatch_av::HwBackend;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the UI from this directory instead of the built-in page
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Largest accepted upload request, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_max_upload_mb() -> u64 {
    4096
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Converted files land in `<output_dir>/<batch id>/`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where uploads are staged (system temp dir when unset)
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Keep staged uploads after a batch finishes
    #[serde(default)]
    pub keep_uploads: bool,

    /// Constant-quality value used when the bitrate is "auto" (CRF scale, default: 23)
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// libx264 preset (default: "medium")
    #[serde(default = "default_preset")]
    pub x264_preset: String,

    /// libx265 preset (default: "medium")
    #[serde(default = "default_preset")]
    pub x265_preset: String,

    /// Hardware encoder backend: auto, none, nvenc, qsv or videotoolbox (default: auto)
    #[serde(default = "default_hw_backend")]
    pub hw_backend: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted_videos")
}

fn default_quality() -> u32 {
    23
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_hw_backend() -> String {
    "auto".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            upload_dir: None,
            keep_uploads: false,
            quality: default_quality(),
            x264_preset: default_preset(),
            x265_preset: default_preset(),
            hw_backend: default_hw_backend(),
        }
    }
}

/// How hardware encoders are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    /// Use the first backend ffmpeg offers.
    Auto,
    /// Never use hardware encoders.
    Disabled,
    /// Only consider this backend.
    Only(HwBackend),
}

impl ConversionConfig {
    pub fn hardware_mode(&self) -> Result<HardwareMode, String> {
        match self.hw_backend.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(HardwareMode::Auto),
            "none" | "off" | "disabled" | "cpu" => Ok(HardwareMode::Disabled),
            other => other.parse().map(HardwareMode::Only),
        }
    }
}
