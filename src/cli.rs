//! Command-line interface (CLI) argument parsing module.
//!
//! This module provides CLI argument parsing using `clap`.
//! Commands: bypass check, DNS speed benchmark, registry speed benchmark,
//! listing candidate files, updating the default lists, and shell completions.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI argument parser using clap derive macro.
///
/// # Example
///
/// ```ignore
/// let cli = Cli::parse();
/// match cli.command {
///     Commands::Check { target } => { /* ... */ }
///     Commands::Dns { url, check, .. } => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "unlocker",
    version,
    about = "Find the DNS resolver or registry mirror that best reaches a blocked resource",
    long_about = "Probes every resolver or registry mirror from the configured lists \
                  concurrently, each under its own deadline, and reports which one works best.",
    infer_subcommands = true
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Configuration directory (default: ~/.config/403unlocker)
    #[arg(long, global = true, env = "UNLOCKER_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Maximum number of candidates probed at once
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI commands.
///
/// This enum represents different output formats that can be used
/// when displaying probe results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default, human-readable)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
    /// TSV format (tab-separated)
    Tsv,
}

impl OutputFormat {
    /// Get all available output format names.
    #[must_use]
    pub fn names() -> &'static [&'static str] {
        &["table", "json", "csv", "tsv"]
    }

    /// Whether the format is meant for people rather than programs.
    #[must_use]
    pub fn is_human(self) -> bool {
        self == Self::Table
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            _ => Err(format!(
                "Unknown format: {}. Valid options are: {:?}",
                s,
                Self::names()
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        })
    }
}

/// Per-candidate deadline override.
#[derive(Debug, Clone, Copy, Args)]
pub struct TimeoutArg {
    /// Seconds allowed per candidate (default from settings, 10)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

/// Available commands for the unlocker CLI.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check which resolvers can reach a domain or URL
    ///
    /// Fetches the target once through every resolver in dns.conf and
    /// saves the ones that answered 200 to dns_cached.conf.
    #[command(alias = "c")]
    Check {
        /// Domain (example.com) or http(s) URL
        target: String,

        #[command(flatten)]
        timeout: TimeoutArg,
    },

    /// Benchmark download speed through each resolver
    ///
    /// Downloads the URL through every resolver for a fixed time and
    /// reports the one that transferred the most data.
    #[command(alias = "d")]
    Dns {
        /// URL of a large file to download
        url: String,

        /// Run a bypass check first and benchmark only the resolvers that passed
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        timeout: TimeoutArg,
    },

    /// Benchmark image pulls from each registry mirror
    #[command(alias = "r")]
    Docker {
        /// Image reference, e.g. nginx:1.27 or library/alpine@sha256:...
        image: String,

        #[command(flatten)]
        timeout: TimeoutArg,
    },

    /// Print a candidate list
    #[command(alias = "l")]
    List {
        /// Show the registry mirror list
        #[arg(long, conflicts_with = "cached")]
        registries: bool,

        /// Show the resolvers saved by the last bypass check
        #[arg(long)]
        cached: bool,
    },

    /// Re-download the default resolver and registry lists
    #[command(alias = "u")]
    Update,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Parse CLI arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("tsv".parse::<OutputFormat>(), Ok(OutputFormat::Tsv));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
        assert!(OutputFormat::Table.is_human());
        assert!(!OutputFormat::Csv.is_human());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dns_with_check_and_timeout() {
        let cli = Cli::try_parse_from([
            "unlocker",
            "--format",
            "json",
            "dns",
            "https://example.com/big.bin",
            "--check",
            "-t",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Dns { url, check, timeout } => {
                assert_eq!(url, "https://example.com/big.bin");
                assert!(check);
                assert_eq!(timeout.timeout, Some(20));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Cli::try_parse_from(["unlocker", "docker", "nginx", "--timeout", "0"]).is_err());
    }

    #[test]
    fn test_list_flags_conflict() {
        assert!(Cli::try_parse_from(["unlocker", "list", "--registries", "--cached"]).is_err());
        let cli = Cli::try_parse_from(["unlocker", "list", "--cached"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                registries: false,
                cached: true
            }
        ));
    }
}
