//! Probe engine.
//!
//! This module provides the generic machinery shared by every command:
//! - Per-candidate transports pinned to one resolver or registry
//! - Probes (reachability, throughput, registry pull)
//! - Concurrent fan-out with per-candidate deadlines
//! - Ranking and persistence of the validated set

pub mod executor;
pub mod fanout;
pub mod http;
pub mod meter;
pub mod persist;
pub mod pull;
pub mod rank;
pub mod scratch;
pub mod transport;
pub mod types;

pub use executor::{execute, Probe, ProbeContext};
pub use fanout::FanOut;
pub use http::{ReachabilityProbe, ThroughputProbe};
pub use meter::{ByteMeter, CountingStream};
pub use persist::{persist_validated, Persisted};
pub use pull::RegistryPullProbe;
pub use rank::{format_data_size, format_throughput, rank, rank_with, RankPolicy, RankedReport};
pub use scratch::ScratchDir;
pub use transport::{
    DnsTransport, DnsTransportFactory, RegistryTransport, RegistryTransportFactory,
    TransportFactory,
};
pub use types::{Candidate, ProbeOutcome, ProbeStatus, ResultSet, RunSummary};
