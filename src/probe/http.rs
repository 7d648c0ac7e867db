//! HTTP probes run through a resolver-pinned transport.
//!
//! - [`ReachabilityProbe`]: resolve the target host, issue one GET,
//!   metric is 1 for a 200 and 0 otherwise.
//! - [`ThroughputProbe`]: stream the target into a scratch file, metric is
//!   the number of body bytes received, including partial transfers.

use crate::error::{Error, Result};
use crate::probe::executor::{Probe, ProbeContext};
use crate::probe::meter::CountingStream;
use crate::probe::scratch::ScratchDir;
use crate::probe::transport::DnsTransport;
use crate::probe::types::ProbeStatus;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Checks whether the target answers 200 when resolved through a candidate.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    url: Url,
}

impl ReachabilityProbe {
    /// Create a probe for `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

#[async_trait]
impl Probe for ReachabilityProbe {
    type Transport = DnsTransport;

    async fn run(&self, transport: DnsTransport, ctx: &ProbeContext) -> Result<ProbeStatus> {
        let host = self
            .url
            .host_str()
            .ok_or_else(|| Error::parse(format!("URL has no host: {}", self.url)))?;

        let ips = transport.resolver.lookup(host).await?;
        tracing::debug!("{}: {host} resolved to {ips:?}", ctx.candidate);

        let response = transport.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            ctx.meter.add(1);
            Ok(ProbeStatus::Ok)
        } else {
            Ok(ProbeStatus::HttpError(status.as_u16()))
        }
    }
}

/// Downloads the target through a candidate and measures bytes received.
#[derive(Debug, Clone)]
pub struct ThroughputProbe {
    url: Url,
    scratch: Arc<ScratchDir>,
}

impl ThroughputProbe {
    /// Create a probe streaming `url` into files under `scratch`.
    #[must_use]
    pub fn new(url: Url, scratch: Arc<ScratchDir>) -> Self {
        Self { url, scratch }
    }
}

#[async_trait]
impl Probe for ThroughputProbe {
    type Transport = DnsTransport;

    async fn run(&self, transport: DnsTransport, ctx: &ProbeContext) -> Result<ProbeStatus> {
        let response = transport.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(ProbeStatus::HttpError(status.as_u16()));
        }

        let dest = self.scratch.file_for(ctx.index, ctx.candidate.as_str());
        let mut file = tokio::fs::File::create(&dest).await?;
        let mut body = CountingStream::new(Box::pin(response.bytes_stream()), ctx.meter.clone());
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(ProbeStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::executor::execute;
    use crate::probe::transport::DnsTransportFactory;
    use crate::probe::types::Candidate;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // The target is addressed by IP, so the candidate resolver is never
    // queried and any syntactically valid candidate works.
    fn factory() -> DnsTransportFactory {
        DnsTransportFactory::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_reachability_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let outcome = execute(
            &factory(),
            &ReachabilityProbe::new(url),
            0,
            Candidate::from("192.0.2.53"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::Ok);
        assert_eq!(outcome.metric, 1);
    }

    #[tokio::test]
    async fn test_reachability_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/blocked", server.uri())).unwrap();
        let outcome = execute(
            &factory(),
            &ReachabilityProbe::new(url),
            0,
            Candidate::from("192.0.2.53"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::HttpError(403));
        assert_eq!(outcome.metric, 0);
    }

    #[tokio::test]
    async fn test_reachability_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let outcome = execute(
            &factory(),
            &ReachabilityProbe::new(url),
            0,
            Candidate::from("192.0.2.53"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::NetworkError);
        assert_eq!(outcome.metric, 0);
    }

    #[tokio::test]
    async fn test_throughput_counts_body_and_writes_scratch() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let scratch = Arc::new(ScratchDir::create_in(root.path()).unwrap());
        let url = Url::parse(&format!("{}/file.bin", server.uri())).unwrap();
        let probe = ThroughputProbe::new(url, scratch.clone());

        let outcome = execute(
            &factory(),
            &probe,
            2,
            Candidate::from("1.1.1.1"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::Ok);
        assert_eq!(outcome.metric, body.len() as u64);

        let written = std::fs::read(scratch.file_for(2, "1.1.1.1")).unwrap();
        assert_eq!(written.len(), body.len());
    }

    #[tokio::test]
    async fn test_throughput_not_found_reads_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let scratch = Arc::new(ScratchDir::create_in(root.path()).unwrap());
        let url = Url::parse(&format!("{}/nope", server.uri())).unwrap();
        let outcome = execute(
            &factory(),
            &ThroughputProbe::new(url, scratch),
            0,
            Candidate::from("1.1.1.1"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::HttpError(404));
        assert_eq!(outcome.metric, 0);
    }

    #[tokio::test]
    async fn test_throughput_timeout_before_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 16])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let scratch = Arc::new(ScratchDir::create_in(root.path()).unwrap());
        let url = Url::parse(&server.uri()).unwrap();
        let outcome = execute(
            &factory(),
            &ThroughputProbe::new(url, scratch),
            0,
            Candidate::from("1.1.1.1"),
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(outcome.status, ProbeStatus::Timeout);
        assert_eq!(outcome.metric, 0);
        assert!(outcome.elapsed < Duration::from_secs(2));
    }
}
