//! Configuration module.
//!
//! Settings, list files under the configuration directory, and the
//! candidate source that falls back to downloading the default lists.

pub mod loader;
pub mod source;

pub use loader::{ConfigLoader, Paths, Settings};
pub use source::CandidateSource;
