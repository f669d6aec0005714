use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidbatch")]
#[command(author, version, about = "Batch video converter with a local web UI")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (default: 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default: 7860)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for converted files (default: ./converted_videos)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
