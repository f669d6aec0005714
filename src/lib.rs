//! vidbatch - batch video conversion through ffmpeg with a local web UI
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod conversion;
pub mod server;
pub mod state;
