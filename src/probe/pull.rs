//! Registry pull probe.
//!
//! Fetches the image manifest (resolving an index to one platform) and
//! then every layer blob from the candidate registry. The metric is the
//! number of layer bytes received; each blob body passes through a
//! [`CountingStream`] so a pull cut short by the deadline or a reset
//! connection still reports what arrived.

use crate::error::{Error, Result};
use crate::probe::executor::{Probe, ProbeContext};
use crate::probe::meter::CountingStream;
use crate::probe::scratch::ScratchDir;
use crate::probe::transport::RegistryTransport;
use crate::probe::types::ProbeStatus;
use crate::registry::client::{host_platform, Manifest, Platform};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// How deep an index may point to another index.
const MAX_INDEX_DEPTH: usize = 2;

/// Pulls an image from a candidate registry.
#[derive(Debug, Clone)]
pub struct RegistryPullProbe {
    scratch: Arc<ScratchDir>,
    platform: Platform,
}

impl RegistryPullProbe {
    /// Create a probe writing layers under `scratch`, for the host platform.
    #[must_use]
    pub fn new(scratch: Arc<ScratchDir>) -> Self {
        Self {
            scratch,
            platform: host_platform(),
        }
    }

    /// Pull a different platform than the host's.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

#[async_trait]
impl Probe for RegistryPullProbe {
    type Transport = RegistryTransport;

    async fn run(&self, transport: RegistryTransport, ctx: &ProbeContext) -> Result<ProbeStatus> {
        let client = &transport.client;
        let mut reference = transport.reference.as_str().to_string();
        let mut depth = 0;

        let manifest = loop {
            let response = client.get_manifest(&reference).await?;
            let status = response.status();
            if !status.is_success() {
                return Ok(ProbeStatus::HttpError(status.as_u16()));
            }
            let manifest: Manifest = serde_json::from_slice(&response.bytes().await?)?;
            if !manifest.is_index() {
                break manifest;
            }
            if depth >= MAX_INDEX_DEPTH {
                return Err(Error::registry("manifest index nested too deeply"));
            }
            let entry = manifest
                .select_platform(&self.platform)
                .ok_or_else(|| Error::registry("empty manifest index"))?;
            tracing::debug!("{}: index -> {}", ctx.candidate, entry.digest);
            reference = entry.digest.clone();
            depth += 1;
        };

        for digest in manifest.layer_digests() {
            let response = client.get_blob(&digest).await?;
            let status = response.status();
            if !status.is_success() {
                return Ok(ProbeStatus::HttpError(status.as_u16()));
            }

            let label = format!("{}-{digest}", ctx.candidate);
            let dest = self.scratch.file_for(ctx.index, &label);
            let mut file = tokio::fs::File::create(&dest).await?;
            let mut body =
                CountingStream::new(Box::pin(response.bytes_stream()), ctx.meter.clone());
            while let Some(chunk) = body.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
        }

        Ok(ProbeStatus::Ok)
    }
}
