//! # vidbatch-av
//!
//! Thin layer over the external `ffmpeg` binary.
//!
//! This crate provides:
//! - Locating ffmpeg/ffprobe on `PATH` or at a configured location
//! - Detecting which hardware encoders the local ffmpeg build offers
//! - Parsing ffmpeg's diagnostic stream into a completion percentage
//! - Running ffmpeg asynchronously with incremental progress and cancellation
//! - A staging workspace for uploaded input files
//!
//! ## Example
//!
//! ```no_run
//! use vidbatch_av::{require_tool, TranscodeCommand};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> vidbatch_av::Result<()> {
//! let ffmpeg = require_tool("ffmpeg")?;
//! let output = TranscodeCommand::new(ffmpeg)
//!     .args(["-i", "in.mov", "-c:v", "libx264", "out.mp4"])
//!     .execute(|pct| println!("{pct:.0}%"), &CancellationToken::new())
//!     .await?;
//! assert!(output.success());
//! # Ok(())
//! # }
//! ```

pub mod encoders;
mod error;
pub mod progress;
pub mod runner;
pub mod tools;
pub mod workspace;

// Re-exports
pub use encoders::{EncoderSet, HwBackend};
pub use error::{Error, Result};
pub use progress::{ProgressEvent, ProgressParser};
pub use runner::{RunOutput, TranscodeCommand};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
pub use workspace::Workspace;
