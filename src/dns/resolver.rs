//! Name resolution pinned to a single candidate resolver.
//!
//! This module provides a resolver that sends every lookup to one
//! nameserver over its standard port, and plugs into `reqwest` so an
//! HTTP client built with it never touches the system resolver.

#![allow(clippy::missing_errors_doc)]

use crate::error::{Error, Result};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Where the candidate resolver lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameserverAddr {
    /// A literal socket address.
    Socket(SocketAddr),
    /// A hostname, looked up through the system on first use.
    Host(String, u16),
}

impl NameserverAddr {
    /// Parse a candidate identifier.
    ///
    /// Accepts `ip`, `ip:port`, `[v6]:port`, `host` and `host:port`.
    /// A missing port means [`DNS_PORT`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let addr = NameserverAddr::parse("1.1.1.1")?;
    /// assert_eq!(addr, NameserverAddr::Socket("1.1.1.1:53".parse()?));
    /// ```
    pub fn parse(candidate: &str) -> Result<Self> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(Error::parse("empty resolver address"));
        }
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return Ok(Self::Socket(SocketAddr::new(ip, DNS_PORT)));
        }
        if let Ok(sock) = candidate.parse::<SocketAddr>() {
            return Ok(Self::Socket(sock));
        }
        let (host, port) = match candidate.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::parse(format!("invalid resolver port in {candidate}")))?;
                (host, port)
            }
            None => (candidate, DNS_PORT),
        };
        if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(Error::parse(format!("invalid resolver address: {candidate}")));
        }
        Ok(Self::Host(host.to_string(), port))
    }
}

/// Resolver that forwards every query to one nameserver.
///
/// Construction does no I/O. The underlying trust-dns resolver (and the
/// system lookup for hostname candidates) is created on the first query.
/// Cloning shares that lazily created state.
#[derive(Clone)]
pub struct NameserverResolver {
    inner: Arc<Inner>,
}

struct Inner {
    addr: NameserverAddr,
    timeout: Duration,
    resolver: OnceCell<TokioAsyncResolver>,
}

impl NameserverResolver {
    /// Create a resolver for `addr` with a per-query timeout.
    #[must_use]
    pub fn new(addr: NameserverAddr, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                addr,
                timeout,
                resolver: OnceCell::new(),
            }),
        }
    }

    /// The nameserver this resolver is pinned to.
    #[must_use]
    pub fn addr(&self) -> &NameserverAddr {
        &self.inner.addr
    }

    /// Resolve `host` through the pinned nameserver.
    ///
    /// IP literals are returned as-is without a query.
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let resolver = self.resolver().await?;
        let response = resolver.lookup_ip(host).await?;
        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(Error::network(format!("no addresses for {host}")));
        }
        Ok(ips)
    }

    async fn resolver(&self) -> Result<&TokioAsyncResolver> {
        self.inner
            .resolver
            .get_or_try_init(|| async {
                let server = match &self.inner.addr {
                    NameserverAddr::Socket(sock) => *sock,
                    NameserverAddr::Host(host, port) => tokio::net::lookup_host((host.as_str(), *port))
                        .await?
                        .next()
                        .ok_or_else(|| Error::network(format!("cannot resolve nameserver {host}")))?,
                };

                let config = ResolverConfig::from_parts(
                    None,
                    vec![],
                    NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true),
                );
                let mut opts = ResolverOpts::default();
                opts.timeout = self.inner.timeout;
                opts.attempts = 1;

                TokioAsyncResolver::tokio(config, opts).map_err(Error::Resolver)
            })
            .await
    }
}

impl std::fmt::Debug for NameserverResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameserverResolver")
            .field("addr", &self.inner.addr)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl Resolve for NameserverResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let this = self.clone();
        Box::pin(async move {
            let ips = this.lookup(name.as_str()).await?;
            tracing::trace!("{} -> {:?} via {:?}", name.as_str(), ips, this.addr());
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
