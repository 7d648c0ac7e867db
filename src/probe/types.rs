//! Probe types and data structures.
//!
//! This module provides the core types shared by every probe run:
//! the candidate identifier, the per-candidate outcome, and the
//! run-scoped result set the fan-out coordinator fills in.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// One interchangeable network intermediary being probed.
///
/// Either a resolver address (`1.1.1.1`, `9.9.9.9:5353`, `dns.example`)
/// or a registry host (`registry.example:5000`, `http://127.0.0.1:5000`).
/// The engine treats it as opaque and never de-duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Candidate(String);

impl Candidate {
    /// Create a new candidate from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Candidate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Candidate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Candidate {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Classification of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The operation completed and the remote side answered with success.
    Ok,
    /// The remote side answered, but with a non-success HTTP status.
    HttpError(u16),
    /// Connect, TLS, resolution or transfer failed before the deadline.
    NetworkError,
    /// The per-candidate deadline fired first.
    Timeout,
}

impl ProbeStatus {
    /// Check if the status indicates a successful probe.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short label used in tables.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Ok => "OK".to_string(),
            Self::HttpError(code) => reqwest::StatusCode::from_u16(*code)
                .ok()
                .and_then(|s| s.canonical_reason().map(|r| format!("{code} {r}")))
                .unwrap_or_else(|| code.to_string()),
            Self::NetworkError => "Error".to_string(),
            Self::Timeout => "Timeout".to_string(),
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Result of probing one candidate.
///
/// Produced exactly once per candidate per run and never mutated after it
/// has been handed to the result set.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    /// The candidate that was probed
    pub candidate: Candidate,
    /// Bytes transferred, or 1/0 for reachability probes
    pub metric: u64,
    /// How the attempt ended
    pub status: ProbeStatus,
    /// Wall time from task start to completion or cancellation
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Error text for failed or timed-out probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeOutcome {
    /// Create an outcome.
    pub fn new(candidate: Candidate, metric: u64, status: ProbeStatus, elapsed: Duration) -> Self {
        Self {
            candidate,
            metric,
            status,
            elapsed,
            detail: None,
        }
    }

    /// Attach an error description.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Bytes per second over the probe's elapsed time.
    #[must_use]
    pub fn rate(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64().max(0.001);
        (self.metric as f64 / secs) as u64
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Run-scoped outcome collection.
///
/// Entries are kept in candidate-source order (not completion order),
/// one per input candidate, duplicates included.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    outcomes: Vec<ProbeOutcome>,
}

impl ResultSet {
    /// Create an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result set from outcomes already in source order.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<ProbeOutcome>) -> Self {
        Self { outcomes }
    }

    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterate in source order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProbeOutcome> {
        self.outcomes.iter()
    }

    /// First outcome recorded for `candidate`.
    #[must_use]
    pub fn get(&self, candidate: &str) -> Option<&ProbeOutcome> {
        self.outcomes.iter().find(|o| o.candidate.as_str() == candidate)
    }

    /// Candidates whose probe ended with [`ProbeStatus::Ok`], in source order.
    pub fn validated(&self) -> impl Iterator<Item = &Candidate> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_ok())
            .map(|o| &o.candidate)
    }

    /// Aggregate counters over the whole set.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::new();
        for outcome in &self.outcomes {
            summary.add_outcome(outcome);
        }
        summary
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ProbeOutcome;
    type IntoIter = std::slice::Iter<'a, ProbeOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Overall run statistics.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Total number of candidates probed
    pub total: usize,
    /// Probes that ended OK
    pub ok: usize,
    /// Probes answered with a non-success HTTP status
    pub http_error: usize,
    /// Probes that failed on the network
    pub network_error: usize,
    /// Probes cut off by their deadline
    pub timeout: usize,
    /// Sum of all metrics
    pub total_bytes: u64,
}

impl RunSummary {
    /// Create a new empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an outcome to the summary.
    pub fn add_outcome(&mut self, outcome: &ProbeOutcome) {
        self.total += 1;
        self.total_bytes += outcome.metric;
        match outcome.status {
            ProbeStatus::Ok => self.ok += 1,
            ProbeStatus::HttpError(_) => self.http_error += 1,
            ProbeStatus::NetworkError => self.network_error += 1,
            ProbeStatus::Timeout => self.timeout += 1,
        }
    }

    /// Calculate success rate as a percentage.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.ok as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, metric: u64, status: ProbeStatus) -> ProbeOutcome {
        ProbeOutcome::new(Candidate::from(id), metric, status, Duration::from_secs(1))
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ProbeStatus::Ok.label(), "OK");
        assert_eq!(ProbeStatus::HttpError(403).label(), "403 Forbidden");
        assert_eq!(ProbeStatus::HttpError(599).label(), "599");
        assert_eq!(ProbeStatus::Timeout.to_string(), "Timeout");
        assert_eq!(ProbeStatus::NetworkError.to_string(), "Error");
    }

    #[test]
    fn test_result_set_keeps_duplicates_and_order() {
        let set = ResultSet::from_outcomes(vec![
            outcome("8.8.8.8", 1, ProbeStatus::Ok),
            outcome("1.1.1.1", 0, ProbeStatus::Timeout),
            outcome("8.8.8.8", 0, ProbeStatus::NetworkError),
        ]);
        assert_eq!(set.len(), 3);
        let ids: Vec<_> = set.iter().map(|o| o.candidate.as_str()).collect();
        assert_eq!(ids, vec!["8.8.8.8", "1.1.1.1", "8.8.8.8"]);
        assert_eq!(set.get("8.8.8.8").map(|o| o.status), Some(ProbeStatus::Ok));
        assert!(set.get("9.9.9.9").is_none());
    }

    #[test]
    fn test_validated_filters_ok_only() {
        let set = ResultSet::from_outcomes(vec![
            outcome("a", 1, ProbeStatus::Ok),
            outcome("b", 0, ProbeStatus::HttpError(403)),
            outcome("c", 1, ProbeStatus::Ok),
        ]);
        let ok: Vec<_> = set.validated().map(Candidate::as_str).collect();
        assert_eq!(ok, vec!["a", "c"]);
    }

    #[test]
    fn test_run_summary() {
        let set = ResultSet::from_outcomes(vec![
            outcome("a", 100, ProbeStatus::Ok),
            outcome("b", 50, ProbeStatus::Timeout),
            outcome("c", 0, ProbeStatus::NetworkError),
            outcome("d", 0, ProbeStatus::HttpError(404)),
        ]);
        let summary = set.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.timeout, 1);
        assert_eq!(summary.network_error, 1);
        assert_eq!(summary.http_error, 1);
        assert_eq!(summary.total_bytes, 150);
        assert!((summary.success_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcome_serializes_elapsed_millis() {
        let o = outcome("1.1.1.1", 10, ProbeStatus::HttpError(404));
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["candidate"], "1.1.1.1");
        assert_eq!(json["elapsed_ms"], 1000);
        assert_eq!(json["status"]["kind"], "http_error");
        assert_eq!(json["status"]["code"], 404);
        assert!(json.get("detail").is_none());
    }
}
