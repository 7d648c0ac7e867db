//! The three runs built on the probe engine.
//!
//! - Bypass check: reachability through every resolver, OK resolvers saved
//!   as the validated set.
//! - DNS speed benchmark: throughput of one download through every resolver.
//! - Registry speed benchmark: bytes of an image pulled from every mirror.
//!
//! Each run loads its candidates, fans the probe out, and ranks the result.
//! Per-candidate failures never surface as errors here; only a missing
//! candidate list does.

use crate::config::{CandidateSource, Paths, Settings};
use crate::error::Result;
use crate::probe::{
    persist_validated, rank, rank_with, Candidate, DnsTransportFactory, FanOut, Persisted, ProbeOutcome,
    RankPolicy, RankedReport, ReachabilityProbe, RegistryPullProbe, RegistryTransportFactory,
    ScratchDir, ThroughputProbe,
};
use crate::registry::ImageReference;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shared state for a command invocation.
#[derive(Debug, Clone)]
pub struct Runner {
    paths: Paths,
    settings: Settings,
    http: reqwest::Client,
}

impl Runner {
    /// Create a runner over the files in `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client for list downloads cannot be built.
    pub fn new(paths: Paths, settings: Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Self {
            paths,
            settings,
            http,
        })
    }

    /// File locations.
    #[must_use]
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Effective settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Source for the primary resolver list.
    #[must_use]
    pub fn dns_source(&self) -> CandidateSource {
        CandidateSource::new(self.paths.dns_list(), &self.settings.dns_list_url)
            .with_client(self.http.clone())
    }

    /// Source for the validated resolver set, refreshing the primary list if absent.
    #[must_use]
    pub fn cached_source(&self) -> CandidateSource {
        CandidateSource::new(self.paths.dns_cached(), &self.settings.dns_list_url)
            .with_fallback_path(self.paths.dns_list())
            .with_client(self.http.clone())
    }

    /// Source for the registry mirror list.
    #[must_use]
    pub fn registry_source(&self) -> CandidateSource {
        CandidateSource::new(self.paths.registry_list(), &self.settings.registry_list_url)
            .with_client(self.http.clone())
    }

    /// Check which resolvers let `target` answer 200, and save them.
    ///
    /// A failure to write the validated set is reported in
    /// [`CheckReport::persisted`] and does not fail the run.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] if no resolver list can be loaded.
    pub async fn bypass_check<C>(
        &self,
        target: &Url,
        timeout: Duration,
        on_outcome: C,
    ) -> Result<CheckReport>
    where
        C: FnMut(&ProbeOutcome),
    {
        let candidates = self.dns_source().load().await?;
        let factory =
            DnsTransportFactory::new(timeout).with_user_agent(&self.settings.user_agent);
        let fanout = FanOut::new(factory, ReachabilityProbe::new(target.clone()), timeout)
            .with_max_concurrency(self.settings.max_concurrency);

        let results = fanout.run_with(&candidates, on_outcome).await;
        let persisted = persist_validated(&results, &self.paths.dns_cached());
        if let Err(e) = &persisted {
            tracing::warn!("{e}");
        }

        Ok(CheckReport {
            target: target.clone(),
            ranked: rank(&results),
            persisted,
        })
    }

    /// Measure how much of `target` each resolver lets through within `timeout`.
    ///
    /// With `check`, a bypass check runs first and only the resolvers that
    /// passed it are benchmarked. If none passed, the cached set from an
    /// earlier run is used.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] if no resolver list can be
    /// loaded, or an I/O error if the scratch directory cannot be created.
    pub async fn dns_speed<C>(
        &self,
        target: &Url,
        check: bool,
        timeout: Duration,
        mut on_outcome: C,
    ) -> Result<SpeedReport>
    where
        C: FnMut(&ProbeOutcome),
    {
        let candidates = if check {
            let report = self
                .bypass_check(target, self.settings.check_timeout(), &mut on_outcome)
                .await?;
            tracing::info!(
                "bypass check passed {} of {} resolvers",
                report.ranked.summary().ok,
                report.ranked.summary().total
            );
            let passed: Vec<Candidate> = report
                .ranked
                .entries()
                .iter()
                .filter(|o| o.status.is_ok())
                .map(|o| o.candidate.clone())
                .collect();
            if passed.is_empty() {
                tracing::warn!(
                    "no resolver passed the bypass check; benchmarking the cached set from an earlier run"
                );
                self.cached_source().load().await?
            } else {
                passed
            }
        } else {
            self.dns_source().load().await?
        };

        let scratch = Arc::new(ScratchDir::create()?);
        let factory =
            DnsTransportFactory::new(timeout).with_user_agent(&self.settings.user_agent);
        let probe = ThroughputProbe::new(target.clone(), Arc::clone(&scratch));
        let fanout = FanOut::new(factory, probe, timeout)
            .with_max_concurrency(self.settings.max_concurrency);

        let results = fanout.run_with(&candidates, on_outcome).await;
        scratch.sweep();

        Ok(SpeedReport {
            target: target.to_string(),
            timeout,
            ranked: rank_with(&results, RankPolicy::AllowPartial),
        })
    }

    /// Measure how much of `image` each registry mirror serves within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] if no registry list can be
    /// loaded, or an I/O error if the scratch directory cannot be created.
    pub async fn registry_speed<C>(
        &self,
        image: &ImageReference,
        timeout: Duration,
        on_outcome: C,
    ) -> Result<SpeedReport>
    where
        C: FnMut(&ProbeOutcome),
    {
        let candidates = self.registry_source().load().await?;
        if let Some(registry) = &image.registry {
            tracing::debug!("ignoring registry {registry}; each mirror is used instead");
        }

        let scratch = Arc::new(ScratchDir::create()?);
        let factory = RegistryTransportFactory::new(image.clone())
            .with_user_agent(&self.settings.user_agent);
        let probe = RegistryPullProbe::new(Arc::clone(&scratch));
        let fanout = FanOut::new(factory, probe, timeout)
            .with_max_concurrency(self.settings.max_concurrency);

        let results = fanout.run_with(&candidates, on_outcome).await;
        scratch.sweep();

        Ok(SpeedReport {
            target: image.to_string(),
            timeout,
            ranked: rank_with(&results, RankPolicy::AllowPartial),
        })
    }

    /// Re-download both default lists, replacing the local copies.
    ///
    /// # Errors
    ///
    /// Returns the first download or write failure.
    pub async fn update_lists(&self) -> Result<Vec<std::path::PathBuf>> {
        let lists = [
            (&self.settings.dns_list_url, self.paths.dns_list()),
            (&self.settings.registry_list_url, self.paths.registry_list()),
        ];
        let mut written = Vec::with_capacity(lists.len());
        for (url, path) in lists {
            crate::config::ConfigLoader::download_list(&self.http, url, &path).await?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Result of a bypass check.
#[derive(Debug)]
pub struct CheckReport {
    /// URL that was fetched through each resolver
    pub target: Url,
    /// Per-resolver outcomes and the winner
    pub ranked: RankedReport,
    /// What happened to the validated set file
    pub persisted: Result<Persisted>,
}

/// Result of a speed benchmark.
#[derive(Debug)]
pub struct SpeedReport {
    /// URL or image that was downloaded
    pub target: String,
    /// Per-candidate deadline
    pub timeout: Duration,
    /// Per-candidate outcomes and the winner
    pub ranked: RankedReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::probe::ProbeStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner(dir: &std::path::Path, server: &MockServer) -> Runner {
        let settings = Settings {
            dns_list_url: format!("{}/dns.conf", server.uri()),
            registry_list_url: format!("{}/dockerRegistry.conf", server.uri()),
            ..Settings::default()
        };
        Runner::new(Paths::new(dir), settings).unwrap()
    }

    // Targets are IP URLs, so resolvers are never queried and the outcome
    // depends only on the target server.
    #[tokio::test]
    async fn test_bypass_check_persists_ok_resolvers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/site"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        std::fs::write(runner.paths().dns_list(), "1.1.1.1 not:a:resolver 8.8.8.8").unwrap();

        let target = Url::parse(&format!("{}/site", server.uri())).unwrap();
        let mut seen = 0;
        let report = runner
            .bypass_check(&target, Duration::from_secs(5), |_| seen += 1)
            .await
            .unwrap();

        assert_eq!(seen, 3);
        assert_eq!(report.ranked.entries().len(), 3);
        assert_eq!(
            report.ranked.entries()[1].status,
            ProbeStatus::NetworkError
        );
        assert_eq!(
            report.ranked.winner().unwrap().candidate.as_str(),
            "1.1.1.1"
        );
        assert!(matches!(
            report.persisted,
            Ok(Persisted::Written { count: 2, .. })
        ));
        assert_eq!(
            std::fs::read_to_string(runner.paths().dns_cached()).unwrap(),
            "1.1.1.1 8.8.8.8"
        );
    }

    #[tokio::test]
    async fn test_bypass_check_all_blocked_keeps_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        std::fs::write(runner.paths().dns_list(), "1.1.1.1 8.8.8.8").unwrap();
        std::fs::write(runner.paths().dns_cached(), "9.9.9.9").unwrap();

        let target = Url::parse(&format!("{}/blocked", server.uri())).unwrap();
        let report = runner
            .bypass_check(&target, Duration::from_secs(5), |_| {})
            .await
            .unwrap();

        assert!(report.ranked.winner().is_none());
        assert_eq!(report.ranked.summary().http_error, 2);
        assert!(matches!(report.persisted, Ok(Persisted::Skipped)));
        assert_eq!(
            std::fs::read_to_string(runner.paths().dns_cached()).unwrap(),
            "9.9.9.9"
        );
    }

    #[tokio::test]
    async fn test_missing_list_without_download_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        let target = Url::parse("http://127.0.0.1/").unwrap();
        let err = runner
            .bypass_check(&target, Duration::from_secs(1), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_dns_speed_downloads_list_and_ranks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dns.conf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.1.1.1\n8.8.8.8\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 32 * 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        let target = Url::parse(&format!("{}/big.bin", server.uri())).unwrap();
        let report = runner
            .dns_speed(&target, false, Duration::from_secs(5), |_| {})
            .await
            .unwrap();

        assert_eq!(report.ranked.entries().len(), 2);
        assert!(report
            .ranked
            .entries()
            .iter()
            .all(|o| o.metric == 32 * 1024));
        assert_eq!(
            report.ranked.winner().unwrap().candidate.as_str(),
            "1.1.1.1"
        );
        assert!(runner.paths().dns_list().exists());
    }

    #[tokio::test]
    async fn test_dns_speed_with_check_uses_validated_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        std::fs::write(runner.paths().dns_list(), "1.1.1.1 bad:resolver:x").unwrap();

        let target = Url::parse(&format!("{}/big.bin", server.uri())).unwrap();
        let report = runner
            .dns_speed(&target, true, Duration::from_secs(5), |_| {})
            .await
            .unwrap();

        let ids: Vec<_> = report
            .ranked
            .entries()
            .iter()
            .map(|o| o.candidate.as_str())
            .collect();
        assert_eq!(ids, vec!["1.1.1.1"]);
    }

    #[tokio::test]
    async fn test_dns_speed_with_check_ignores_unwritable_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        std::fs::write(runner.paths().dns_list(), "1.1.1.1 bad:resolver:x 8.8.8.8").unwrap();
        std::fs::create_dir(runner.paths().dns_cached()).unwrap();

        let target = Url::parse(&format!("{}/big.bin", server.uri())).unwrap();
        let report = runner
            .dns_speed(&target, true, Duration::from_secs(5), |_| {})
            .await
            .unwrap();

        let ids: Vec<_> = report
            .ranked
            .entries()
            .iter()
            .map(|o| o.candidate.as_str())
            .collect();
        assert_eq!(ids, vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_dns_speed_with_check_falls_back_to_cache_when_none_pass() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        std::fs::write(runner.paths().dns_list(), "1.1.1.1 8.8.8.8").unwrap();
        std::fs::write(runner.paths().dns_cached(), "9.9.9.9").unwrap();

        let target = Url::parse(&format!("{}/big.bin", server.uri())).unwrap();
        let report = runner
            .dns_speed(&target, true, Duration::from_secs(5), |_| {})
            .await
            .unwrap();

        assert_eq!(report.ranked.entries().len(), 1);
        assert_eq!(report.ranked.entries()[0].candidate.as_str(), "9.9.9.9");
        assert!(report.ranked.winner().is_none());
    }

    #[tokio::test]
    async fn test_update_lists_writes_both_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dns.conf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.1.1.1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dockerRegistry.conf"))
            .respond_with(ResponseTemplate::new(200).set_body_string("mirror.example"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), &server);
        let written = runner.update_lists().await.unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(runner.paths().registry_list()).unwrap(),
            "mirror.example"
        );
    }
}
