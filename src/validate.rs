//! Input validation for command targets.
//!
//! Commands accept a domain or an http(s) URL for resolver checks and an
//! image reference for registry benchmarks. Validation happens here, before
//! any probing starts; the engine itself assumes a well-formed target.

use crate::error::{Error, Result};
use crate::registry::reference::ImageReference;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const DOMAIN_PATTERN: &str = r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$";

const IMAGE_PATTERN: &str = concat!(
    r"^(?:[a-zA-Z0-9\-._]+(?::[0-9]+)?/)?",
    r"(?:[a-z0-9\-._]+/)?",
    r"[a-z0-9\-._]+",
    r"(?::[a-zA-Z0-9\-._]+)?",
    r"(?:@[a-zA-Z0-9\-._:]+)?$",
);

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| {
        Regex::new(pattern)
            .map_err(|e| tracing::error!("invalid built-in pattern {pattern}: {e}"))
            .ok()
    })
    .as_ref()
}

fn domain_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, DOMAIN_PATTERN)
}

fn image_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, IMAGE_PATTERN)
}

/// Check whether `domain` is a syntactically valid DNS name with a TLD.
#[must_use]
pub fn is_domain(domain: &str) -> bool {
    if domain.len() > MAX_DOMAIN_LEN {
        return false;
    }
    if !domain_regex().is_some_and(|re| re.is_match(domain)) {
        return false;
    }
    domain
        .split('.')
        .all(|label| (1..=MAX_LABEL_LEN).contains(&label.len()))
}

/// Check whether `input` is an absolute http or https URL with a host.
#[must_use]
pub fn is_http_url(input: &str) -> bool {
    Url::parse(input)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Check whether `image` looks like `[registry[:port]/][namespace/]name[:tag][@digest]`.
#[must_use]
pub fn is_image_reference(image: &str) -> bool {
    !image.contains("@@") && image_regex().is_some_and(|re| re.is_match(image))
}

/// Turn a domain or http(s) URL into the URL to probe.
///
/// Bare domains (optionally followed by a path) get `https://`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the input is neither a valid domain nor an
/// http(s) URL.
///
/// # Example
///
/// ```ignore
/// let url = normalize_target("pkg.go.dev")?;
/// assert_eq!(url.as_str(), "https://pkg.go.dev/");
/// ```
pub fn normalize_target(input: &str) -> Result<Url> {
    let input = input.trim();
    if is_http_url(input) {
        return Ok(Url::parse(input)?);
    }

    let host = input.split('/').next().unwrap_or_default();
    if !input.contains("://") && is_domain(host) {
        return Ok(Url::parse(&format!("https://{input}"))?);
    }

    Err(Error::parse(format!(
        "invalid domain or URL: {input:?} (expected e.g. example.com or https://example.com/path)"
    )))
}

/// Validate and parse an image reference.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the reference is malformed.
pub fn parse_image(input: &str) -> Result<ImageReference> {
    let input = input.trim();
    if !is_image_reference(input) {
        return Err(Error::parse(format!("invalid image name: {input:?}")));
    }
    ImageReference::parse(input)
}
