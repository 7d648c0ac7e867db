//! Settings and candidate list files.
//!
//! This module provides the on-disk side of configuration: the optional
//! `config.json` settings file, the whitespace-delimited candidate list
//! files, and the download of the default lists.

use crate::error::{Error, Result};
use crate::probe::types::Candidate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration directory.
pub const APP_DIR: &str = "403unlocker";

/// Primary resolver list file.
pub const DNS_LIST_FILE: &str = "dns.conf";

/// Validated resolver list written by the bypass check.
pub const DNS_CACHED_FILE: &str = "dns_cached.conf";

/// Registry mirror list file.
pub const REGISTRY_LIST_FILE: &str = "dockerRegistry.conf";

/// Optional settings file.
pub const SETTINGS_FILE: &str = "config.json";

/// Upstream default resolver list.
pub const DNS_LIST_URL: &str =
    "https://raw.githubusercontent.com/403unlocker/403Unlocker-cli/refs/heads/main/config/dns.conf";

/// Upstream default registry list.
pub const REGISTRY_LIST_URL: &str = "https://raw.githubusercontent.com/403unlocker/403Unlocker-cli/refs/heads/main/config/dockerRegistry.conf";

/// Runtime settings.
///
/// Every field has a default, so a partial `config.json` is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Where the default resolver list is downloaded from
    pub dns_list_url: String,
    /// Where the default registry list is downloaded from
    pub registry_list_url: String,
    /// Per-resolver deadline for the bypass check, in seconds
    pub check_timeout_secs: u64,
    /// Per-candidate deadline for speed benchmarks, in seconds
    pub benchmark_timeout_secs: u64,
    /// Maximum probes in flight (unbounded when absent)
    pub max_concurrency: Option<usize>,
    /// `User-Agent` sent by probes
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dns_list_url: DNS_LIST_URL.to_string(),
            registry_list_url: REGISTRY_LIST_URL.to_string(),
            check_timeout_secs: 10,
            benchmark_timeout_secs: 10,
            max_concurrency: None,
            user_agent: crate::probe::transport::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    /// Bypass-check deadline.
    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs.max(1))
    }

    /// Benchmark deadline.
    #[must_use]
    pub fn benchmark_timeout(&self) -> Duration {
        Duration::from_secs(self.benchmark_timeout_secs.max(1))
    }
}

/// Resolved locations of every file the tool reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Base configuration directory
    pub root: PathBuf,
}

impl Paths {
    /// Use `root` as the configuration directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Primary resolver list.
    #[must_use]
    pub fn dns_list(&self) -> PathBuf {
        self.root.join(DNS_LIST_FILE)
    }

    /// Validated resolver cache.
    #[must_use]
    pub fn dns_cached(&self) -> PathBuf {
        self.root.join(DNS_CACHED_FILE)
    }

    /// Registry mirror list.
    #[must_use]
    pub fn registry_list(&self) -> PathBuf {
        self.root.join(REGISTRY_LIST_FILE)
    }

    /// Settings file.
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(ConfigLoader::config_dir())
    }
}

/// Configuration and list file loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Get the default config directory path (`~/.config/403unlocker` on Linux).
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from `paths`, falling back to defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_settings_or_default(paths: &Paths) -> Result<Settings> {
        let path = paths.settings();
        if !path.exists() {
            return Ok(Settings::default());
        }
        Self::load_settings(&path).map_err(|e| {
            Error::config(format!("invalid settings in {}: {e}", path.display()))
        })
    }

    /// Read a whitespace-delimited candidate list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds no tokens.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // dns.conf: "1.1.1.1 8.8.8.8\n9.9.9.9"
    /// let list = ConfigLoader::read_candidates("dns.conf")?;
    /// assert_eq!(list.len(), 3);
    /// ```
    pub fn read_candidates<P: AsRef<Path>>(path: P) -> Result<Vec<Candidate>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let candidates = parse_candidates(&content);
        if candidates.is_empty() {
            return Err(Error::config(format!(
                "{} has no entries",
                path.as_ref().display()
            )));
        }
        Ok(candidates)
    }

    /// Write candidates as space-separated tokens, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn write_candidates<P: AsRef<Path>>(path: P, candidates: &[Candidate]) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = candidates
            .iter()
            .map(Candidate::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        std::fs::write(path, content)
    }

    /// Download a list from `url` and store it verbatim at `path`.
    ///
    /// The file is only touched once the whole body has arrived.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status, or write failure.
    pub async fn download_list(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
        tracing::info!("downloading default list from {url}");
        let body = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &body).await?;
        tracing::debug!("wrote {} bytes to {}", body.len(), path.display());
        Ok(())
    }
}

/// Split list file content into candidates.
#[must_use]
pub fn parse_candidates(content: &str) -> Vec<Candidate> {
    content.split_whitespace().map(Candidate::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates_mixed_whitespace() {
        let list = parse_candidates("1.1.1.1 8.8.8.8\n\t9.9.9.9  \r\n\n");
        let ids: Vec<_> = list.iter().map(Candidate::as_str).collect();
        assert_eq!(ids, vec!["1.1.1.1", "8.8.8.8", "9.9.9.9"]);
    }

    #[test]
    fn test_read_candidates_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns.conf");
        std::fs::write(&path, "  \n ").unwrap();
        assert!(ConfigLoader::read_candidates(&path).is_err());
        assert!(ConfigLoader::read_candidates(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_write_creates_parent_and_joins_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache/dns_cached.conf");
        let list = vec![Candidate::from("1.1.1.1"), Candidate::from("8.8.8.8")];
        ConfigLoader::write_candidates(&path, &list).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.1.1.1 8.8.8.8");
    }

    #[test]
    fn test_settings_defaults_and_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        assert_eq!(
            ConfigLoader::load_settings_or_default(&paths).unwrap(),
            Settings::default()
        );

        std::fs::write(paths.settings(), r#"{"check_timeout_secs": 3, "max_concurrency": 16}"#)
            .unwrap();
        let settings = ConfigLoader::load_settings_or_default(&paths).unwrap();
        assert_eq!(settings.check_timeout(), Duration::from_secs(3));
        assert_eq!(settings.max_concurrency, Some(16));
        assert_eq!(settings.dns_list_url, DNS_LIST_URL);
    }

    #[test]
    fn test_invalid_settings_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        std::fs::write(paths.settings(), "{not json").unwrap();
        let err = ConfigLoader::load_settings_or_default(&paths).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::new("/cfg");
        assert_eq!(paths.dns_list(), PathBuf::from("/cfg/dns.conf"));
        assert_eq!(paths.dns_cached(), PathBuf::from("/cfg/dns_cached.conf"));
        assert_eq!(paths.registry_list(), PathBuf::from("/cfg/dockerRegistry.conf"));
    }
}
