//! Report rendering.
//!
//! Turns a [`RankedReport`] into a table, JSON, CSV or TSV. Rendering
//! returns a `String` so the binary decides where it goes.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::probe::{format_data_size, format_throughput, ProbeOutcome, RankedReport};
use crossterm::style::Stylize;
use serde::Serialize;

/// What the metric column of a report means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Reachability (1/0) through a resolver
    Status,
    /// Bytes of a download through a resolver
    Throughput,
    /// Bytes of an image pulled from a registry
    Size,
}

impl MetricKind {
    fn candidate_header(self) -> &'static str {
        match self {
            Self::Status | Self::Throughput => "DNS Server",
            Self::Size => "Registry",
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    kind: MetricKind,
    winner: Option<&'a ProbeOutcome>,
    results: &'a [ProbeOutcome],
    summary: &'a crate::probe::RunSummary,
}

/// Render `report` in `format`.
///
/// `color` only affects tables.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(report: &RankedReport, kind: MetricKind, format: OutputFormat, color: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Table => render_table(report, kind, color),
        OutputFormat::Json => render_json(report, kind)?,
        OutputFormat::Csv => render_delimited(report, ','),
        OutputFormat::Tsv => render_delimited(report, '\t'),
    })
}

/// Render a bordered table followed by the winner and a summary line.
#[must_use]
pub fn render_table(report: &RankedReport, kind: MetricKind, color: bool) -> String {
    let name_width = report
        .entries()
        .iter()
        .map(|o| o.candidate.as_str().len())
        .max()
        .unwrap_or(0)
        .max(18);

    let columns: Vec<(&str, usize)> = match kind {
        MetricKind::Status => vec![("Status", 16)],
        MetricKind::Throughput => vec![("Downloaded", 12), ("Speed", 14), ("Status", 16)],
        MetricKind::Size => vec![("Downloaded", 12), ("Status", 16)],
    };

    let border = {
        let mut line = format!("+{}", "-".repeat(name_width + 2));
        for &(_, width) in &columns {
            line.push('+');
            line.push_str(&"-".repeat(width + 2));
        }
        line.push('+');
        line
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format!("| {:<name_width$} |", kind.candidate_header()));
    for &(title, width) in &columns {
        out.push_str(&format!(" {title:<width$} |"));
    }
    out.push('\n');
    out.push_str(&border);
    out.push('\n');

    for outcome in report.entries() {
        let status = paint(&format!("{:<16}", outcome.status.label()), outcome, color);
        out.push_str(&format!("| {:<name_width$} |", outcome.candidate.as_str()));
        match kind {
            MetricKind::Status => {}
            MetricKind::Throughput => {
                out.push_str(&format!(" {:<12} |", format_data_size(outcome.metric)));
                out.push_str(&format!(" {:<14} |", format_throughput(outcome.rate())));
            }
            MetricKind::Size => {
                out.push_str(&format!(" {:<12} |", format_data_size(outcome.metric)));
            }
        }
        out.push_str(&format!(" {status} |\n"));
    }
    out.push_str(&border);
    out.push_str("\n\n");

    out.push_str(&winner_line(report, kind, color));
    out.push('\n');
    out.push_str(&summary_line(report));
    out.push('\n');
    out
}

fn paint(text: &str, outcome: &ProbeOutcome, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    if outcome.status.is_ok() {
        text.green().to_string()
    } else if outcome.metric > 0 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

fn winner_line(report: &RankedReport, kind: MetricKind, color: bool) -> String {
    let highlight = |s: String| if color { s.green().to_string() } else { s };

    if kind == MetricKind::Status {
        let reachable: Vec<&str> = report
            .entries()
            .iter()
            .filter(|o| o.status.is_ok())
            .map(|o| o.candidate.as_str())
            .collect();
        return if reachable.is_empty() {
            "No DNS server could reach the target.".to_string()
        } else {
            format!("Reachable through: {}", highlight(reachable.join(" ")))
        };
    }

    match (report.winner(), kind) {
        (Some(best), MetricKind::Throughput) => format!(
            "Best DNS: {} ({})",
            highlight(best.candidate.to_string()),
            highlight(format_throughput(best.rate()))
        ),
        (Some(best), _) => format!(
            "Best registry: {} ({} downloaded)",
            highlight(best.candidate.to_string()),
            highlight(format_data_size(best.metric))
        ),
        (None, MetricKind::Throughput) => "No DNS server was able to download any data.".to_string(),
        (None, _) => "No registry was able to serve any data.".to_string(),
    }
}

fn summary_line(report: &RankedReport) -> String {
    let s = report.summary();
    format!(
        "Total: {}  OK: {}  HTTP errors: {}  Network errors: {}  Timeouts: {}  Transferred: {}",
        s.total,
        s.ok,
        s.http_error,
        s.network_error,
        s.timeout,
        format_data_size(s.total_bytes)
    )
}

fn render_json(report: &RankedReport, kind: MetricKind) -> Result<String> {
    let json = JsonReport {
        kind,
        winner: report.winner(),
        results: report.entries(),
        summary: report.summary(),
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

fn render_delimited(report: &RankedReport, sep: char) -> String {
    let mut out = ["#", "Candidate", "Status", "Bytes", "ElapsedMs", "BytesPerSec", "Best"]
        .join(&sep.to_string());
    out.push('\n');
    for (idx, o) in report.entries().iter().enumerate() {
        let best = report.winner_index() == Some(idx);
        let row = [
            (idx + 1).to_string(),
            o.candidate.to_string(),
            o.status.label(),
            o.metric.to_string(),
            o.elapsed.as_millis().to_string(),
            o.rate().to_string(),
            best.to_string(),
        ];
        out.push_str(&row.join(&sep.to_string()));
        out.push('\n');
    }
    out
}
