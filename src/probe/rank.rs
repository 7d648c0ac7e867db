//! Reducing a result set to a winner.
//!
//! The ranker scans outcomes in candidate-source order and keeps a running
//! maximum with a strict `>` comparison, so on a tie the candidate listed
//! first keeps the lead. Because the scan order is the source order (not
//! completion order), the winner is deterministic for a given set.

use crate::probe::types::{ProbeOutcome, ProbeStatus, ResultSet, RunSummary};
use serde::Serialize;

/// Which outcomes may win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Only OK outcomes with a positive metric.
    #[default]
    OkOnly,
    /// OK outcomes, plus timed-out outcomes that transferred something.
    ///
    /// Suits fixed-deadline download benchmarks where running out of time
    /// is the normal way a probe ends.
    AllowPartial,
}

impl RankPolicy {
    fn eligible(self, outcome: &ProbeOutcome) -> bool {
        if outcome.metric == 0 {
            return false;
        }
        match self {
            Self::OkOnly => outcome.status.is_ok(),
            Self::AllowPartial => {
                matches!(outcome.status, ProbeStatus::Ok | ProbeStatus::Timeout)
            }
        }
    }
}

/// Read-only view over a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RankedReport {
    entries: Vec<ProbeOutcome>,
    winner: Option<usize>,
    summary: RunSummary,
}

impl RankedReport {
    /// All outcomes in candidate-source order.
    #[must_use]
    pub fn entries(&self) -> &[ProbeOutcome] {
        &self.entries
    }

    /// The best candidate, or `None` when no candidate succeeded.
    #[must_use]
    pub fn winner(&self) -> Option<&ProbeOutcome> {
        self.winner.map(|i| &self.entries[i])
    }

    /// Position of the winner in [`RankedReport::entries`].
    #[must_use]
    pub fn winner_index(&self) -> Option<usize> {
        self.winner
    }

    /// Aggregate counters.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

/// Rank with the default policy ([`RankPolicy::OkOnly`]).
#[must_use]
pub fn rank(results: &ResultSet) -> RankedReport {
    rank_with(results, RankPolicy::OkOnly)
}

/// Rank under an explicit policy.
#[must_use]
pub fn rank_with(results: &ResultSet, policy: RankPolicy) -> RankedReport {
    let mut winner: Option<usize> = None;
    let mut best = 0u64;

    for (i, outcome) in results.iter().enumerate() {
        if policy.eligible(outcome) && outcome.metric > best {
            best = outcome.metric;
            winner = Some(i);
        }
    }

    RankedReport {
        entries: results.iter().cloned().collect(),
        winner,
        summary: results.summary(),
    }
}

/// Format a byte count with binary units.
///
/// # Example
///
/// ```ignore
/// assert_eq!(format_data_size(1536), "1.50 KB");
/// ```
#[must_use]
pub fn format_data_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{b} Bytes"),
    }
}

/// Format a transfer rate.
#[must_use]
pub fn format_throughput(bytes_per_sec: u64) -> String {
    format!("{}/s", format_data_size(bytes_per_sec))
}
