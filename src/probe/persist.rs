//! Writing the validated set.
//!
//! After a bypass check the OK candidates replace the previous validated
//! set file. An empty set leaves the previous file in place.

use crate::config::loader::ConfigLoader;
use crate::error::{Error, Result};
use crate::probe::types::{Candidate, ResultSet};
use std::path::{Path, PathBuf};

/// What [`persist_validated`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// `count` candidates were written to `path`.
    Written {
        /// Destination file
        path: PathBuf,
        /// Number of candidates written
        count: usize,
    },
    /// No candidate succeeded; the file was not touched.
    Skipped,
}

/// Persist the OK candidates of `results` to `path`, in source order.
///
/// # Errors
///
/// Returns [`Error::Persist`] if the directory or file cannot be written.
pub fn persist_validated(results: &ResultSet, path: &Path) -> Result<Persisted> {
    let validated: Vec<Candidate> = results.validated().cloned().collect();
    if validated.is_empty() {
        tracing::warn!(
            "no candidate passed; keeping existing {}",
            path.display()
        );
        return Ok(Persisted::Skipped);
    }

    ConfigLoader::write_candidates(path, &validated).map_err(|source| Error::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("saved {} candidates to {}", validated.len(), path.display());

    Ok(Persisted::Written {
        path: path.to_path_buf(),
        count: validated.len(),
    })
}
