//! Minimal Registry HTTP API v2 client.
//!
//! Only what a pull needs: fetch a manifest (following an index to the
//! host platform), then stream each layer blob. Anonymous bearer-token
//! challenges are answered once and the token is reused for the rest of
//! the pull.

#![allow(clippy::missing_errors_doc)]

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

/// Manifest media types we can read, most specific first.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.docker.distribution.manifest.v1+prettyjws";

/// Content descriptor inside a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    /// Media type of the referenced content
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
    /// Content digest
    pub digest: String,
    /// Declared size in bytes
    #[serde(default)]
    pub size: u64,
    /// Target platform (index entries only)
    #[serde(default)]
    pub platform: Option<Platform>,
}

/// Platform of an index entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Platform {
    /// CPU architecture (`amd64`, `arm64`, ...)
    pub architecture: String,
    /// Operating system
    pub os: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FsLayer {
    #[serde(rename = "blobSum")]
    blob_sum: String,
}

/// Manifest or index document.
///
/// One struct covers OCI indexes, Docker manifest lists, OCI/Docker image
/// manifests and legacy schema-1 manifests: only the fields that matter
/// for a pull are read.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Entries of an index / manifest list
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    /// Layers of an image manifest
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(rename = "fsLayers", default)]
    fs_layers: Vec<FsLayer>,
}

impl Manifest {
    /// Whether this document points at other manifests.
    #[must_use]
    pub fn is_index(&self) -> bool {
        !self.manifests.is_empty()
    }

    /// Layer digests in pull order.
    #[must_use]
    pub fn layer_digests(&self) -> Vec<String> {
        if self.layers.is_empty() {
            // schema 1 lists layers newest first
            self.fs_layers.iter().rev().map(|l| l.blob_sum.clone()).collect()
        } else {
            self.layers.iter().map(|l| l.digest.clone()).collect()
        }
    }

    /// Pick the index entry for `platform`, else linux/amd64, else the first.
    #[must_use]
    pub fn select_platform(&self, platform: &Platform) -> Option<&Descriptor> {
        let amd64 = Platform {
            architecture: "amd64".into(),
            os: "linux".into(),
        };
        self.manifests
            .iter()
            .find(|d| d.platform.as_ref() == Some(platform))
            .or_else(|| self.manifests.iter().find(|d| d.platform.as_ref() == Some(&amd64)))
            .or_else(|| self.manifests.first())
    }
}

/// Platform of the running host, in registry vocabulary.
#[must_use]
pub fn host_platform() -> Platform {
    let architecture = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        other => other,
    };
    Platform {
        architecture: architecture.to_string(),
        os: "linux".to_string(),
    }
}

/// Parsed `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint
    pub realm: String,
    /// Service name to request a token for
    pub service: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse a challenge header value. Returns `None` for non-bearer schemes.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Split `k="v",k2="v,2"` respecting quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (quoted[..end].to_string(), &quoted[end + 1..]),
                None => (quoted.to_string(), ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim().to_string(), &after[end..]),
                None => (after.trim().to_string(), ""),
            }
        };
        out.push((key, value));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }
    out
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Client bound to one registry and one repository.
#[derive(Debug)]
pub struct RegistryClient {
    http: Client,
    base: Url,
    repository: String,
    token: Mutex<Option<String>>,
}

impl RegistryClient {
    /// Create a client for `repository` on the registry at `base`.
    #[must_use]
    pub fn new(http: Client, base: Url, repository: impl Into<String>) -> Self {
        Self {
            http,
            base,
            repository: repository.into(),
            token: Mutex::new(None),
        }
    }

    /// Registry base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Repository path.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn endpoint(&self, kind: &str, reference: &str) -> Result<Url> {
        let path = format!("v2/{}/{kind}/{reference}", self.repository);
        Ok(self.base.join(&path)?)
    }

    /// GET a manifest. Non-success statuses are returned, not raised.
    pub async fn get_manifest(&self, reference: &str) -> Result<Response> {
        let url = self.endpoint("manifests", reference)?;
        self.get(url, Some(MANIFEST_ACCEPT)).await
    }

    /// GET a blob. Non-success statuses are returned, not raised.
    pub async fn get_blob(&self, digest: &str) -> Result<Response> {
        let url = self.endpoint("blobs", digest)?;
        self.get(url, None).await
    }

    /// GET with the cached token, answering one bearer challenge if needed.
    async fn get(&self, url: Url, accept: Option<&str>) -> Result<Response> {
        let response = self.send(url.clone(), accept).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = bearer_challenge(response.headers()) else {
            return Ok(response);
        };
        let token = self.fetch_token(&challenge).await?;
        *self.token.lock().await = Some(token);
        self.send(url, accept).await
    }

    async fn send(&self, url: Url, accept: Option<&str>) -> Result<Response> {
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = self.token.lock().await.as_deref() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    async fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String> {
        let mut url = Url::parse(&challenge.realm)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                query.append_pair("service", service);
            }
            let scope = challenge
                .scope
                .clone()
                .unwrap_or_else(|| format!("repository:{}:pull", self.repository));
            query.append_pair("scope", &scope);
        }

        tracing::debug!("requesting registry token from {url}");
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::registry(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }
        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| Error::registry("token endpoint returned no token"))
    }
}

fn bearer_challenge(headers: &HeaderMap) -> Option<BearerChallenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(BearerChallenge::parse)
}
