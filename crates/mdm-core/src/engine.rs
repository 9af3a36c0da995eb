//! Transfer engine seam: commands the orchestrator issues and events it consumes.
//!
//! The engine performs the network fetch and archive extraction on its own
//! workers and reports back through a single serialized event stream.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::JobKey;

/// How a `finished` event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishKind {
    /// Extraction ran as part of a download.
    Auto,
    /// Extraction was requested directly for a local archive.
    Manual,
}

/// Events emitted by the transfer engine, tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransferEvent {
    Progress {
        key: JobKey,
        downloaded: u64,
        total: u64,
        /// Bytes per second.
        speed: f64,
        /// Estimated seconds remaining, if known.
        eta: Option<f64>,
    },
    Extracted {
        key: JobKey,
    },
    Cancelled {
        key: JobKey,
    },
    Finished {
        key: JobKey,
        kind: FinishKind,
    },
    /// The engine gave up on the transfer (network error, timeout, bad archive).
    Failed {
        key: JobKey,
        reason: String,
    },
}

impl TransferEvent {
    pub fn key(&self) -> &JobKey {
        match self {
            TransferEvent::Progress { key, .. }
            | TransferEvent::Extracted { key }
            | TransferEvent::Cancelled { key }
            | TransferEvent::Finished { key, .. }
            | TransferEvent::Failed { key, .. } => key,
        }
    }
}

/// Parameters for one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub key: JobKey,
    pub source_url: String,
    /// Staging root. The engine writes and extracts under `<dest_root>/<key>`.
    pub dest_root: PathBuf,
    /// Name the engine gives the downloaded file inside the staging directory.
    pub file_name: String,
    /// When false the engine must not emit progress events (preview side-fetches).
    pub notify: bool,
}

/// Extract a local archive without downloading anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub key: JobKey,
    pub archive_path: PathBuf,
    /// Staging root, as for `TransferRequest`.
    pub dest_root: PathBuf,
}

/// Commands accepted by the transfer engine. All are fire-and-forget: results
/// arrive later as `TransferEvent`s.
pub trait TransferEngine: Send + Sync {
    /// Begin download + extract. An `Err` means the engine refused the job outright.
    fn start_transfer(&self, request: TransferRequest) -> anyhow::Result<()>;

    /// Begin extracting a local archive. Completion is reported as
    /// `finished` with `FinishKind::Manual`.
    fn extract_archive(&self, request: ExtractRequest) -> anyhow::Result<()>;

    /// Best-effort abort.
    fn cancel_transfer(&self, key: &JobKey);
}
