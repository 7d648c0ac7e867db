//! unlocker - find the DNS resolver or registry mirror that gets through.
//!
//! This crate provides both a library API and a CLI tool for:
//! - Checking which DNS resolvers let a blocked domain answer
//! - Benchmarking download throughput through each resolver
//! - Benchmarking image pulls from each container registry mirror
//! - Multiple output formats (table, JSON, CSV, TSV)
//!
//! Every command is the same run: load candidates, probe all of them
//! concurrently under a per-candidate deadline, rank the outcomes.
//!
//! # Library Usage
//!
//! ```ignore
//! use unlocker::probe::{rank, DnsTransportFactory, FanOut, ReachabilityProbe};
//!
//! let fanout = FanOut::new(
//!     DnsTransportFactory::new(timeout),
//!     ReachabilityProbe::new(url),
//!     timeout,
//! );
//! let results = fanout.run(&candidates).await;
//! if let Some(best) = rank(&results).winner() {
//!     println!("{}", best.candidate);
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Which resolvers reach the site (saves them to dns_cached.conf)
//! unlocker check pkg.go.dev
//!
//! # Download speed through each resolver, only those that pass the check
//! unlocker dns https://example.com/big.bin --check --timeout 15
//!
//! # Image pull speed from each registry mirror
//! unlocker docker nginx:1.27
//!
//! # Show or refresh candidate lists
//! unlocker list --registries
//! unlocker update
//! ```

pub mod cli;
pub mod config;
pub mod dns;
pub mod error;
pub mod flows;
pub mod output;
pub mod probe;
pub mod registry;
pub mod validate;

// Re-export commonly used types
pub use cli::{Cli, Commands, OutputFormat};
pub use config::{CandidateSource, ConfigLoader, Paths, Settings};
pub use error::{Error, Result};
pub use flows::{CheckReport, Runner, SpeedReport};
pub use probe::{
    rank, Candidate, FanOut, ProbeOutcome, ProbeStatus, RankPolicy, RankedReport, ResultSet,
};
