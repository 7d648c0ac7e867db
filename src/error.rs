//! Error types module.
//!
//! This module defines the error types used throughout the unlocker crate.
//! It uses `thiserror` for structured error handling and provides
//! a custom `Result` type alias for convenience.
//!
//! Only candidate-source and persistence failures ever reach the caller of
//! a run. Per-candidate faults are classified with [`Error::is_timeout`] and
//! recorded as probe outcomes instead.

use std::path::PathBuf;
use thiserror::Error;
use trust_dns_resolver::error::ResolveErrorKind;

/// A specialized `Result` type for unlocker operations.
///
/// This type is used throughout the crate to handle errors consistently.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the unlocker crate.
///
/// Each variant represents a different category of error that can occur
/// while loading candidates, probing them, or persisting results.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, scratch files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (settings file, registry manifests, JSON output)
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// DNS resolver error (lookups through a candidate resolver)
    #[error("DNS resolver error: {0}")]
    Resolver(#[from] trust_dns_resolver::error::ResolveError),

    /// HTTP client error (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// No candidate list could be obtained from cache or the default download.
    #[error("candidate list unavailable: {reason}")]
    SourceUnavailable {
        /// What failed on the last attempt
        reason: String,
    },

    /// Writing the validated candidate cache failed.
    #[error("failed to persist validated candidates to {}: {source}", path.display())]
    Persist {
        /// Destination cache file
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// Network-related error (connection failures, unresolvable names)
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (invalid config, missing files)
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error (invalid input format, malformed data)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Registry protocol error (unexpected manifest, failed token exchange)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Operation timeout
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Create a new network error with a message.
    #[must_use]
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new parse error with a message.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new registry error with a message.
    #[must_use]
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Check whether this error means a deadline ran out rather than a hard failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Http(e) => e.is_timeout(),
            Self::Resolver(e) => matches!(e.kind(), ResolveErrorKind::Timeout),
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(Error::Timeout.is_timeout());
        assert!(Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow")).is_timeout());
        assert!(!Error::network("connection refused").is_timeout());
        assert!(!Error::parse("bad").is_timeout());
    }

    #[test]
    fn test_persist_error_message() {
        let err = Error::Persist {
            path: PathBuf::from("/nope/dns_cached.conf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope/dns_cached.conf"));
        assert!(msg.contains("denied"));
    }
}
