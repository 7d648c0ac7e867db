//! Run-scoped scratch storage for download probes.
//!
//! Each run gets its own directory, named after the process id, a
//! millisecond timestamp and an in-process sequence number, so concurrent
//! runs never share files. The directory is removed when the run ends,
//! whatever the outcome.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Temporary directory owned by a single run.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create() -> Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    /// Create a fresh scratch directory under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_in(root: &Path) -> Result<Self> {
        let run_id = chrono::Utc::now().timestamp_millis();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let path = root.join(format!("unlocker-{}-{run_id}-{seq}", std::process::id()));
        std::fs::create_dir_all(&path)?;
        tracing::debug!("scratch directory {}", path.display());
        Ok(Self { path })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination for one probe's download.
    ///
    /// `index` is the candidate's position in the run, which keeps
    /// duplicate candidates apart.
    #[must_use]
    pub fn file_for(&self, index: usize, label: &str) -> PathBuf {
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.path.join(format!("{index}-{safe}"))
    }

    /// Best-effort removal of everything in the directory.
    pub fn sweep(&self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("swept scratch directory {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("could not remove {}: {e}", self.path.display()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create_in(root.path()).unwrap();
        let dir = scratch.path().to_path_buf();
        assert!(dir.is_dir());

        let file = scratch.file_for(3, "8.8.8.8:53");
        std::fs::write(&file, b"partial").unwrap();
        assert!(file.file_name().unwrap().to_str().unwrap().starts_with("3-8.8.8.8_53"));

        drop(scratch);
        assert!(!dir.exists());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create_in(root.path()).unwrap();
        scratch.sweep();
        scratch.sweep();
        assert!(!scratch.path().exists());
    }
}
