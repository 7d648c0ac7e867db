//! Concurrent fan-out of one probe across every candidate.
//!
//! One tokio task per candidate; each sends its outcome over a channel to
//! the collector, which is the only owner of the result slots. The run
//! returns after every task has finished (join barrier): there is no early
//! exit on first success.

#![allow(clippy::missing_panics_doc)]

use crate::probe::executor::{execute, Probe};
use crate::probe::transport::TransportFactory;
use crate::probe::types::{Candidate, ProbeOutcome, ProbeStatus, ResultSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

/// Runs a probe against every candidate concurrently.
///
/// # Example
///
/// ```ignore
/// let fanout = FanOut::new(DnsTransportFactory::new(timeout), ReachabilityProbe::new(url), timeout);
/// let results = fanout.run(&candidates).await;
/// assert_eq!(results.len(), candidates.len());
/// ```
#[derive(Debug)]
pub struct FanOut<F, P> {
    factory: Arc<F>,
    probe: Arc<P>,
    timeout: Duration,
    max_concurrency: Option<usize>,
}

impl<F, P> FanOut<F, P>
where
    F: TransportFactory + 'static,
    P: Probe<Transport = F::Transport> + 'static,
{
    /// Create a coordinator with a per-candidate `timeout`.
    pub fn new(factory: F, probe: P, timeout: Duration) -> Self {
        Self {
            factory: Arc::new(factory),
            probe: Arc::new(probe),
            timeout,
            max_concurrency: None,
        }
    }

    /// Cap the number of probes in flight. `None` means unbounded.
    ///
    /// A throttled candidate's deadline starts only once it gets a slot.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.map(|n| n.max(1));
        self
    }

    /// Per-candidate timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe every candidate and collect one outcome per candidate.
    pub async fn run(&self, candidates: &[Candidate]) -> ResultSet {
        self.run_with(candidates, |_| {}).await
    }

    /// Like [`FanOut::run`], calling `on_outcome` as each outcome arrives
    /// (completion order).
    pub async fn run_with<C>(&self, candidates: &[Candidate], mut on_outcome: C) -> ResultSet
    where
        C: FnMut(&ProbeOutcome),
    {
        if candidates.is_empty() {
            return ResultSet::new();
        }

        let started = Instant::now();
        tracing::info!(
            "probing {} candidates (timeout {:?})",
            candidates.len(),
            self.timeout
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ProbeOutcome)>();
        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut handles = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().cloned().enumerate() {
            let tx = tx.clone();
            let factory = Arc::clone(&self.factory);
            let probe = Arc::clone(&self.probe);
            let limiter = limiter.clone();
            let timeout = self.timeout;

            handles.push(tokio::spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = execute(&*factory, &*probe, index, candidate, timeout).await;
                let _ = tx.send((index, outcome));
            }));
        }
        drop(tx);

        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; candidates.len()];
        while let Some((index, outcome)) = rx.recv().await {
            on_outcome(&outcome);
            slots[index] = Some(outcome);
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                tracing::warn!("probe task failed: {e}");
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(candidates)
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| {
                    ProbeOutcome::new(
                        candidate.clone(),
                        0,
                        ProbeStatus::NetworkError,
                        started.elapsed(),
                    )
                    .with_detail("probe task aborted")
                })
            })
            .collect();

        tracing::info!("run finished in {:?}", started.elapsed());
        ResultSet::from_outcomes(outcomes)
    }
}
