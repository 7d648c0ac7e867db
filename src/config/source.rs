//! Candidate source with download fallback.
//!
//! Reads the preferred list file first. When that fails (missing, empty,
//! unreadable) the default list is downloaded to the primary list path and
//! read exactly once more. Only if both fail is the run aborted.

use crate::config::loader::ConfigLoader;
use crate::error::{Error, Result};
use crate::probe::types::Candidate;
use std::path::PathBuf;

/// Where a run's candidates come from.
#[derive(Debug, Clone)]
pub struct CandidateSource {
    path: PathBuf,
    fallback_path: PathBuf,
    default_url: String,
    client: reqwest::Client,
}

impl CandidateSource {
    /// Read `path`; on failure download `default_url` into `path` and retry.
    pub fn new(path: impl Into<PathBuf>, default_url: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            fallback_path: path.clone(),
            path,
            default_url: default_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Download into `fallback_path` instead of `path`.
    ///
    /// Used when `path` is a cache (e.g. the validated set) and the download
    /// should refresh the primary list.
    #[must_use]
    pub fn with_fallback_path(mut self, fallback_path: impl Into<PathBuf>) -> Self {
        self.fallback_path = fallback_path.into();
        self
    }

    /// Use a specific HTTP client for the download.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Load the ordered candidate list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] if neither the file nor the
    /// downloaded default list yields any candidates.
    pub async fn load(&self) -> Result<Vec<Candidate>> {
        match ConfigLoader::read_candidates(&self.path) {
            Ok(list) => {
                tracing::debug!("{} candidates from {}", list.len(), self.path.display());
                return Ok(list);
            }
            Err(e) => tracing::warn!(
                "cannot use {} ({e}); falling back to {}",
                self.path.display(),
                self.default_url
            ),
        }

        ConfigLoader::download_list(&self.client, &self.default_url, &self.fallback_path)
            .await
            .map_err(|e| Error::SourceUnavailable {
                reason: format!("download of {} failed: {e}", self.default_url),
            })?;

        ConfigLoader::read_candidates(&self.fallback_path).map_err(|e| Error::SourceUnavailable {
            reason: format!("downloaded list unusable: {e}"),
        })
    }
}
