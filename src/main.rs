mod cli;

use vidbatch::{
    config,
    conversion::{FfmpegTranscoder, HardwareSupport},
    server, state,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::sync::Arc;

async fn start_server(cli: Cli) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(cli.config.as_deref())?;

    // Override from CLI if specified
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.output_dir {
        config.conversion.output_dir = dir;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting vidbatch {}", env!("CARGO_PKG_VERSION"));

    // ffmpeg is the one hard requirement
    let ffmpeg = vidbatch_av::get_tool_path("ffmpeg", config.tools.ffmpeg_path.as_deref())
        .context("ffmpeg is required; install it or set tools.ffmpeg_path")?;
    tracing::info!("Using ffmpeg at {:?}", ffmpeg);

    let hardware_mode = config
        .conversion
        .hardware_mode()
        .map_err(|e| anyhow::anyhow!(e))?;
    let encoders = {
        let ffmpeg = ffmpeg.clone();
        tokio::task::spawn_blocking(move || vidbatch_av::encoders::list_encoders(&ffmpeg))
            .await?
            .unwrap_or_else(|e| {
                tracing::warn!("Could not list ffmpeg encoders, GPU encoding disabled: {}", e);
                Default::default()
            })
    };
    let hardware = HardwareSupport::new(encoders, hardware_mode);
    match hardware.backends().as_slice() {
        [] => tracing::info!("No hardware encoders available, using software encoding"),
        backends => tracing::info!(
            "Hardware encoders available: {}",
            backends
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }

    let state = state::AppState::new();
    let transcoder = Arc::new(FfmpegTranscoder::new(ffmpeg));

    server::start_server(config, state, transcoder, hardware).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidbatch=trace,vidbatch_av=trace,vidbatch_common=debug,tower_http=debug".to_string()
        } else {
            "vidbatch=info,vidbatch_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(start_server(cli))
}
