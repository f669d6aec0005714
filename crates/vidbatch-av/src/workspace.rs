//! Staging area for uploaded input files.

use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding one batch's uploaded inputs.
///
/// Files are removed when the workspace is dropped unless [`Workspace::keep`]
/// is called.
///
/// # Example
///
/// ```no_run
/// use vidbatch_av::Workspace;
///
/// let mut workspace = Workspace::new()?;
/// let first = workspace.reserve("clip.mov")?;
/// let second = workspace.reserve("clip.mov")?;
/// assert_ne!(first, second);
/// # Ok::<(), vidbatch_av::Error>(())
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    reserved: HashSet<PathBuf>,
}

impl Workspace {
    /// Create a workspace in the system temp directory.
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("vidbatch-upload-")
            .tempdir()
            .map_err(|e| Error::Workspace(e.to_string()))?;
        Ok(Self::from_temp_dir(temp_dir))
    }

    /// Create a workspace under `base`, creating `base` if needed.
    pub fn new_in<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            Error::Workspace(format!("Failed to create {}: {}", base.display(), e))
        })?;
        let temp_dir = tempfile::Builder::new()
            .prefix("vidbatch-upload-")
            .tempdir_in(base)
            .map_err(|e| Error::Workspace(e.to_string()))?;
        Ok(Self::from_temp_dir(temp_dir))
    }

    fn from_temp_dir(temp_dir: TempDir) -> Self {
        Self {
            temp_dir,
            reserved: HashSet::new(),
        }
    }

    /// Get the workspace directory path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Reserve a path for `file_name` inside the workspace.
    ///
    /// Clients often upload several files with the same name; later ones are
    /// prefixed with a counter (`1~clip.mov`). Callers keep the uploaded name
    /// separately for display and output naming.
    pub fn reserve(&mut self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "Invalid upload file name: {:?}",
                file_name
            )));
        }

        let mut candidate = self.temp_dir.path().join(file_name);
        let mut n = 1;
        while self.reserved.contains(&candidate) {
            candidate = self.temp_dir.path().join(format!("{n}~{file_name}"));
            n += 1;
        }
        self.reserved.insert(candidate.clone());
        Ok(candidate)
    }

    /// Persist the directory instead of deleting it on drop.
    pub fn keep(self) -> PathBuf {
        self.temp_dir.keep()
    }

    /// Delete the workspace and everything in it now.
    pub fn cleanup(self) -> Result<()> {
        self.temp_dir
            .close()
            .map_err(|e| Error::Workspace(format!("Failed to remove upload directory: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_unique_paths() {
        let mut workspace = Workspace::new().unwrap();

        let a = workspace.reserve("clip.mov").unwrap();
        let b = workspace.reserve("clip.mov").unwrap();
        let c = workspace.reserve("other.mkv").unwrap();

        assert!(a.starts_with(workspace.path()));
        assert_eq!(a.file_name().unwrap(), "clip.mov");
        assert_eq!(b.file_name().unwrap(), "1~clip.mov");
        assert_eq!(c.file_name().unwrap(), "other.mkv");
        assert_eq!(
            workspace.reserve("clip.mov").unwrap().file_name().unwrap(),
            "2~clip.mov"
        );
    }

    #[test]
    fn test_reserve_rejects_paths() {
        let mut workspace = Workspace::new().unwrap();
        assert!(workspace.reserve("../escape.mov").is_err());
        assert!(workspace.reserve("").is_err());
        assert_eq!(
            workspace.reserve("clip.mov").unwrap().file_name().unwrap(),
            "clip.mov"
        );
    }

    #[test]
    fn test_cleanup_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::new_in(base.path().join("uploads")).unwrap();
        let file = workspace.reserve("clip.mov").unwrap();
        std::fs::write(&file, b"data").unwrap();

        let dir = workspace.path().to_path_buf();
        workspace.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_keep_persists_directory() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::new_in(base.path()).unwrap();
        let dir = workspace.keep();
        assert!(dir.exists());
        assert!(dir.starts_with(base.path()));
    }
}
