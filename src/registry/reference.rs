//! Container image references.
//!
//! Parses `registry/repository[:tag|@digest]` into its parts. The registry
//! part is optional; when a benchmark runs, it is replaced by each
//! candidate mirror in turn.

use crate::error::{Error, Result};
use std::fmt;

/// Tag used when a reference names neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// Tag or digest part of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Mutable tag, e.g. `latest`.
    Tag(String),
    /// Content digest, e.g. `sha256:abc...`.
    Digest(String),
}

impl Reference {
    /// The string to put after `/manifests/`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tag(t) | Self::Digest(t) => t,
        }
    }
}

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host (with optional port) if one was given.
    pub registry: Option<String>,
    /// Repository path, with `library/` added to single-segment names.
    pub repository: String,
    /// Tag or digest.
    pub reference: Reference,
}

impl ImageReference {
    /// Parse an image reference.
    ///
    /// The first path segment is treated as a registry when it contains a
    /// `.` or a `:`, or is `localhost`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for empty names, empty tags or empty digests.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let image = ImageReference::parse("nginx:1.27")?;
    /// assert_eq!(image.repository, "library/nginx");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::parse("image name cannot be empty"));
        }

        let (name, digest) = match input.split_once('@') {
            Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
            Some(_) => return Err(Error::parse(format!("empty digest in {input}"))),
            None => (input, None),
        };

        let last_slash = name.rfind('/');
        let (name, tag) = match name.rfind(':') {
            Some(colon) if last_slash.map_or(true, |slash| colon > slash) => {
                let tag = &name[colon + 1..];
                if tag.is_empty() {
                    return Err(Error::parse(format!("empty tag in {input}")));
                }
                (&name[..colon], Some(tag.to_string()))
            }
            _ => (name, None),
        };

        let (registry, path) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest)
            }
            _ => (None, name),
        };

        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(Error::parse(format!("invalid repository in {input}")));
        }

        let repository = if path.contains('/') {
            path.to_string()
        } else {
            format!("library/{path}")
        };

        let reference = match (digest, tag) {
            (Some(d), _) => Reference::Digest(d),
            (None, Some(t)) => Reference::Tag(t),
            (None, None) => Reference::Tag(DEFAULT_TAG.to_string()),
        };

        Ok(Self {
            registry,
            repository,
            reference,
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        match &self.reference {
            Reference::Tag(t) => write!(f, "{}:{t}", self.repository),
            Reference::Digest(d) => write!(f, "{}@{d}", self.repository),
        }
    }
}
