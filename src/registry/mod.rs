//! Container registry access.
//!
//! Just enough of the registry v2 API to pull an image: reference
//! parsing, manifest and blob fetches, and anonymous bearer tokens.

pub mod client;
pub mod reference;

pub use client::{Manifest, Platform, RegistryClient};
pub use reference::{ImageReference, Reference};
