//! DNS module.
//!
//! Resolution pinned to a single candidate nameserver, used by the
//! transports of the bypass check and the DNS speed benchmark.

pub mod resolver;

pub use resolver::{NameserverAddr, NameserverResolver, DNS_PORT};
