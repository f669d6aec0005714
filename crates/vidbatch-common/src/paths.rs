//! Path utilities for recognizing video inputs and naming uploaded files.

use std::path::Path;

/// Extensions accepted as conversion inputs.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "mpeg", "mpg", "m4v", "ts", "webm",
];

/// Check if a path has a video file extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vidbatch_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.MOV")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get the list of accepted video file extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Reduce a client-supplied file name to a bare, filesystem-safe name.
///
/// Directory components are dropped and characters outside
/// `[A-Za-z0-9._ -]` become `_`. Returns `None` if nothing usable is left.
///
/// ```
/// use vidbatch_common::paths::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("../../etc/clip.mov").as_deref(), Some("clip.mov"));
/// assert_eq!(sanitize_file_name("C:\\Videos\\a:b.mp4").as_deref(), Some("a_b.mp4"));
/// assert_eq!(sanitize_file_name(".."), None);
/// ```
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned.to_string())
    }
}
