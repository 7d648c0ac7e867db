//! Per-candidate transport construction.
//!
//! A [`TransportFactory`] turns one candidate into an isolated client whose
//! network behaviour is pinned to that candidate. Building never does I/O
//! and never shares mutable state between candidates: every call returns a
//! fresh client with its own connection pool, resolver and token cache.

use crate::dns::resolver::{NameserverAddr, NameserverResolver};
use crate::error::{Error, Result};
use crate::probe::types::Candidate;
use crate::registry::client::RegistryClient;
use crate::registry::reference::{ImageReference, Reference};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default `User-Agent` for probe clients.
pub const DEFAULT_USER_AGENT: &str = concat!("unlocker/", env!("CARGO_PKG_VERSION"));

/// Builds one transport per candidate.
pub trait TransportFactory: Send + Sync {
    /// Client type handed to the probe.
    type Transport: Send + 'static;

    /// Build an independent transport for `candidate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate identifier cannot be turned into a
    /// client; the run records that candidate as a network failure.
    fn build(&self, candidate: &Candidate) -> Result<Self::Transport>;
}

/// HTTP client whose name resolution goes through one resolver.
#[derive(Debug, Clone)]
pub struct DnsTransport {
    /// Client using the pinned resolver for every hostname
    pub client: Client,
    /// The pinned resolver, for explicit lookups
    pub resolver: NameserverResolver,
}

/// Factory for [`DnsTransport`]s.
///
/// TLS, redirects and everything else stay at `reqwest` defaults; only
/// name resolution is redirected to the candidate.
#[derive(Debug, Clone)]
pub struct DnsTransportFactory {
    lookup_timeout: Duration,
    user_agent: String,
}

impl DnsTransportFactory {
    /// Create a factory. `lookup_timeout` bounds each DNS query.
    #[must_use]
    pub fn new(lookup_timeout: Duration) -> Self {
        Self {
            lookup_timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl TransportFactory for DnsTransportFactory {
    type Transport = DnsTransport;

    fn build(&self, candidate: &Candidate) -> Result<DnsTransport> {
        let addr = NameserverAddr::parse(candidate.as_str())?;
        let resolver = NameserverResolver::new(addr, self.lookup_timeout);
        // A proxy would resolve the target itself and bypass the candidate.
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .no_proxy()
            .dns_resolver(Arc::new(resolver.clone()))
            .build()?;
        Ok(DnsTransport { client, resolver })
    }
}

/// Registry client scoped to `candidate/repository`.
#[derive(Debug)]
pub struct RegistryTransport {
    /// Client bound to the candidate registry and the image repository
    pub client: RegistryClient,
    /// Tag or digest to pull
    pub reference: Reference,
}

/// Factory for [`RegistryTransport`]s.
#[derive(Debug, Clone)]
pub struct RegistryTransportFactory {
    image: ImageReference,
    user_agent: String,
}

impl RegistryTransportFactory {
    /// Create a factory pulling `image` from each candidate.
    ///
    /// Any registry named in `image` is ignored: candidates replace it.
    #[must_use]
    pub fn new(image: ImageReference) -> Self {
        Self {
            image,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The image being pulled.
    #[must_use]
    pub fn image(&self) -> &ImageReference {
        &self.image
    }
}

/// Base URL for a registry candidate.
///
/// `host[:port]` means HTTPS; an explicit `http://` or `https://` prefix is kept.
///
/// # Errors
///
/// Returns an error if the candidate is not a valid host or URL.
pub fn registry_base_url(candidate: &str) -> Result<Url> {
    let candidate = candidate.trim().trim_end_matches('/');
    let raw = if candidate.starts_with("http://") || candidate.starts_with("https://") {
        format!("{candidate}/")
    } else {
        format!("https://{candidate}/")
    };
    let url = Url::parse(&raw)?;
    if url.host_str().is_none() {
        return Err(Error::parse(format!("registry without host: {candidate}")));
    }
    Ok(url)
}

impl TransportFactory for RegistryTransportFactory {
    type Transport = RegistryTransport;

    fn build(&self, candidate: &Candidate) -> Result<RegistryTransport> {
        let base = registry_base_url(candidate.as_str())?;
        let http = Client::builder()
            .user_agent(&self.user_agent)
            .no_proxy()
            .build()?;
        Ok(RegistryTransport {
            client: RegistryClient::new(http, base, self.image.repository.clone()),
            reference: self.image.reference.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_factory_builds_independent_transports() {
        let factory = DnsTransportFactory::new(Duration::from_secs(2));
        let a = factory.build(&Candidate::from("1.1.1.1")).unwrap();
        let b = factory.build(&Candidate::from("dns.example:5353")).unwrap();
        assert_eq!(
            a.resolver.addr(),
            &NameserverAddr::Socket("1.1.1.1:53".parse().unwrap())
        );
        assert_eq!(
            b.resolver.addr(),
            &NameserverAddr::Host("dns.example".into(), 5353)
        );
    }

    #[test]
    fn test_dns_factory_rejects_garbage() {
        let factory = DnsTransportFactory::new(Duration::from_secs(2));
        assert!(factory.build(&Candidate::from("not a resolver:xx")).is_err());
    }

    #[test]
    fn test_registry_base_url() {
        assert_eq!(
            registry_base_url("mirror.example").unwrap().as_str(),
            "https://mirror.example/"
        );
        assert_eq!(
            registry_base_url("mirror.example:5000").unwrap().as_str(),
            "https://mirror.example:5000/"
        );
        assert_eq!(
            registry_base_url("http://127.0.0.1:5000/").unwrap().as_str(),
            "http://127.0.0.1:5000/"
        );
        assert!(registry_base_url("bad host").is_err());
    }

    #[test]
    fn test_registry_factory_scopes_to_candidate_and_image() {
        let image = ImageReference::parse("docker.io/library/nginx:1.27").unwrap();
        let factory = RegistryTransportFactory::new(image);
        let transport = factory.build(&Candidate::from("mirror.example")).unwrap();
        assert_eq!(transport.client.base().as_str(), "https://mirror.example/");
        assert_eq!(transport.client.repository(), "library/nginx");
        assert_eq!(transport.reference, Reference::Tag("1.27".into()));
    }
}
