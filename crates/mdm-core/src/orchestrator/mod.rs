//! Top-level wiring: the single owner of all job state.
//!
//! The `Orchestrator` holds the partition set, progress scratch, decision
//! queue and recovery mirror. Every mutation goes through one of its
//! methods, and every method re-runs admission before returning so freed
//! capacity is reused immediately. Run it as an actor with
//! [`Orchestrator::spawn`] and talk to it through an [`OrchestratorHandle`].

mod dispatch;
mod events;
mod handle;
mod intake;

pub use handle::{input_channel, Input, OrchestratorHandle, INPUT_CAPACITY};
pub use intake::Routed;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::catalog::MetadataProvider;
use crate::config::MdmConfig;
use crate::conflict::{DecisionQueue, PendingDecision};
use crate::engine::TransferEngine;
use crate::job::{JobKey, JobPartitions, Partition, PartitionSnapshot};
use crate::progress::ProgressReducer;
use crate::recovery_db::RecoveryDb;
use crate::scheduler::AdmissionController;

/// Buffered notices per subscriber before the slowest one starts lagging.
pub const NOTICE_CAPACITY: usize = 256;

/// Push-style updates for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// Throttled progress text for one job.
    Progress {
        key: JobKey,
        percent: f64,
        status_line: String,
    },
    DecisionQueued(PendingDecision),
    Installed { key: JobKey, path: PathBuf },
    /// Finalization did not commit files; the job stays `completed`.
    InstallSkipped { key: JobKey, reason: String },
}

/// Serialized read view of everything the orchestrator owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrchestratorSnapshot {
    pub partitions: PartitionSnapshot,
    /// Latest percentage per job in `downloading`.
    pub progress: BTreeMap<JobKey, f64>,
    pub active_decision: Option<PendingDecision>,
    pub pending_decisions: usize,
}

pub struct Orchestrator {
    cfg: MdmConfig,
    engine: Arc<dyn TransferEngine>,
    metadata: Arc<dyn MetadataProvider>,
    recovery: RecoveryDb,
    staging_root: PathBuf,
    partitions: JobPartitions,
    admission: AdmissionController,
    reducer: ProgressReducer,
    decisions: DecisionQueue,
    notices: broadcast::Sender<Notice>,
    snapshots: watch::Sender<OrchestratorSnapshot>,
}

impl Orchestrator {
    pub fn new(
        cfg: MdmConfig,
        engine: Arc<dyn TransferEngine>,
        metadata: Arc<dyn MetadataProvider>,
        recovery: RecoveryDb,
        staging_root: PathBuf,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (snapshots, _) = watch::channel(OrchestratorSnapshot::default());
        let admission = AdmissionController::new(cfg.effective_concurrency());
        Self {
            cfg,
            engine,
            metadata,
            recovery,
            staging_root,
            partitions: JobPartitions::new(),
            admission,
            reducer: ProgressReducer::default(),
            decisions: DecisionQueue::new(),
            notices,
            snapshots,
        }
    }

    pub fn config(&self) -> &MdmConfig {
        &self.cfg
    }

    pub fn partitions(&self) -> &JobPartitions {
        &self.partitions
    }

    pub fn decisions(&self) -> &DecisionQueue {
        &self.decisions
    }

    pub fn reducer(&self) -> &ProgressReducer {
        &self.reducer
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<OrchestratorSnapshot> {
        self.snapshots.subscribe()
    }

    /// Change the concurrency limit and admit any newly allowed jobs.
    pub async fn set_concurrency_limit(&mut self, limit: u32) {
        self.cfg.concurrency_limit = limit;
        self.admission.set_limit(self.cfg.effective_concurrency());
        self.pump().await;
        self.publish();
    }

    /// Rebuild `downloading`/`extracting` from the recovery mirror. Call once
    /// before the first input. Returns how many jobs were restored.
    pub async fn restore(&mut self) -> anyhow::Result<usize> {
        let entries = self.recovery.list().await?;
        let mut restored = 0;
        for entry in entries {
            if self.partitions.contains(&entry.job.key) {
                continue;
            }
            let partition = match entry.status {
                crate::job::JobStatus::Extracting => Partition::Extracting,
                _ => Partition::Downloading,
            };
            let key = entry.job.key.clone();
            match self.partitions.insert(partition, entry.job) {
                Ok(()) => {
                    tracing::info!(key = %key, status = %partition.status(), "restored job");
                    restored += 1;
                }
                Err(e) => tracing::warn!(key = %key, "skipping recovery entry: {e}"),
            }
        }
        if self.partitions.len(Partition::Downloading) > self.admission.limit() {
            tracing::warn!(
                downloading = self.partitions.len(Partition::Downloading),
                limit = self.admission.limit(),
                "restored more transfers than the current limit; admission paused until they drain"
            );
        }
        self.publish();
        Ok(restored)
    }

    /// Current read view.
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            partitions: self.partitions.snapshot(),
            progress: self.reducer.percentages().into_iter().collect(),
            active_decision: self.decisions.active().cloned(),
            pending_decisions: self.decisions.len(),
        }
    }

    pub(crate) fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }
}
