//! Single bounded probe execution.
//!
//! [`execute`] runs one probe against one candidate under its own deadline
//! and always returns a [`ProbeOutcome`]: build failures, network errors and
//! deadline expiry are all turned into data here so a bad candidate can
//! never abort a run.

use crate::error::Result;
use crate::probe::meter::ByteMeter;
use crate::probe::transport::TransportFactory;
use crate::probe::types::{Candidate, ProbeOutcome, ProbeStatus};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Per-invocation context handed to a probe.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Position of the candidate in the run (distinguishes duplicates)
    pub index: usize,
    /// Candidate being probed
    pub candidate: Candidate,
    /// Metric accumulator read by the executor, even after cancellation
    pub meter: ByteMeter,
}

/// One network operation run against a target through a candidate's transport.
///
/// Implementations add their metric to `ctx.meter` as they go and return
/// the final status. They may return errors freely; the executor decides
/// whether an error counts as a timeout or a network failure.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Transport this probe consumes.
    type Transport: Send + 'static;

    /// Run the operation once.
    async fn run(&self, transport: Self::Transport, ctx: &ProbeContext) -> Result<ProbeStatus>;
}

/// Build a transport for `candidate` and run `probe` under `timeout`.
///
/// The deadline starts when this function is called, so each candidate
/// gets its full budget no matter when its task was scheduled.
pub async fn execute<F, P>(
    factory: &F,
    probe: &P,
    index: usize,
    candidate: Candidate,
    timeout: Duration,
) -> ProbeOutcome
where
    F: TransportFactory + ?Sized,
    P: Probe<Transport = F::Transport> + ?Sized,
{
    let started = Instant::now();
    let meter = ByteMeter::new();

    let transport = match factory.build(&candidate) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::debug!("{candidate}: cannot build transport: {e}");
            return ProbeOutcome::new(candidate, 0, ProbeStatus::NetworkError, started.elapsed())
                .with_detail(e.to_string());
        }
    };

    let ctx = ProbeContext {
        index,
        candidate,
        meter,
    };

    let (status, detail) = match tokio::time::timeout(timeout, probe.run(transport, &ctx)).await {
        Ok(Ok(status)) => (status, None),
        Ok(Err(e)) if e.is_timeout() => (ProbeStatus::Timeout, Some(e.to_string())),
        Ok(Err(e)) => (ProbeStatus::NetworkError, Some(e.to_string())),
        Err(_) => (
            ProbeStatus::Timeout,
            Some(format!("deadline of {}s exceeded", timeout.as_secs_f64())),
        ),
    };

    let ProbeContext {
        candidate, meter, ..
    } = ctx;
    let outcome = ProbeOutcome {
        candidate,
        metric: meter.get(),
        status,
        elapsed: started.elapsed(),
        detail,
    };
    tracing::debug!(
        "{}: {} metric={} in {:?}",
        outcome.candidate,
        outcome.status,
        outcome.metric,
        outcome.elapsed
    );
    outcome
}
