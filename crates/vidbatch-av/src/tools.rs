//! External tool detection and management.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the version banner, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// ffmpeg-family tools take `-version` rather than `--version`.
///
/// # Example
///
/// ```no_run
/// use vidbatch_av::check_tool;
///
/// let info = check_tool("ffmpeg", None);
/// if info.available {
///     println!("ffmpeg version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, configured: Option<&Path>) -> ToolInfo {
    let program = match get_tool_path(name, configured) {
        Ok(path) => path,
        Err(_) => {
            return ToolInfo {
                name: name.to_string(),
                available: false,
                version: None,
                path: None,
            }
        }
    };

    match Command::new(&program).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: Some(program),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: Some(program),
        },
    }
}

/// Check the tools vidbatch relies on: ffmpeg (required) and ffprobe (informational).
pub fn check_tools(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Vec<ToolInfo> {
    vec![check_tool("ffmpeg", ffmpeg), check_tool("ffprobe", ffprobe)]
}

/// Require that a tool is on `PATH`, returning its path.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
///
/// A configured path that does not exist is an error rather than a silent
/// fallback, so a typo in the config is reported instead of picking up some
/// other binary.
pub fn get_tool_path(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::tool_failed(
            name,
            format!("configured path does not exist: {}", path.display()),
        ));
    }

    require_tool(name)
}
