mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./vidbatch.toml",
        "./config.toml",
        "~/.config/vidbatch/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::info!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_mb == 0 {
        anyhow::bail!("server.max_upload_mb must be greater than 0");
    }

    if config.conversion.quality > 51 {
        anyhow::bail!(
            "conversion.quality must be between 0 and 51, got {}",
            config.conversion.quality
        );
    }

    if config.conversion.x264_preset.trim().is_empty()
        || config.conversion.x265_preset.trim().is_empty()
    {
        anyhow::bail!("Encoder presets cannot be empty");
    }

    config
        .conversion
        .hardware_mode()
        .map_err(|e| anyhow::anyhow!("Invalid conversion.hw_backend: {}", e))?;

    if let Some(ref path) = config.tools.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}
