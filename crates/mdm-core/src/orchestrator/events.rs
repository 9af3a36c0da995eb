//! Engine events, cancellation and clearing.

use std::time::Instant;

use super::{Notice, Orchestrator};
use crate::engine::TransferEvent;
use crate::job::{JobError, JobKey, JobRecord, JobStatus, Partition};
use crate::progress::Reduction;
use crate::storage::{self, FinalizeOptions, InstallOutcome};

impl Orchestrator {
    /// Apply one engine event. Unknown keys are ignored.
    pub async fn handle_event(&mut self, event: TransferEvent) {
        let key = event.key().clone();
        let recovered = if self.partitions.contains(&key) {
            None
        } else {
            match self.recovery.get(&key).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(key = %key, "recovery lookup failed: {e:#}");
                    None
                }
            }
        };

        let reduction = self.reducer.apply(
            event,
            &mut self.partitions,
            recovered,
            self.cfg.categorized_layout,
            Instant::now(),
        );
        match reduction {
            Reduction::Ignored => tracing::debug!(key = %key, "event ignored"),
            Reduction::Progress {
                key,
                percent,
                status_line,
                promoted,
            } => {
                if promoted {
                    tracing::info!(key = %key, "job promoted from recovery mirror");
                }
                if let Some(status_line) = status_line {
                    self.notify(Notice::Progress {
                        key,
                        percent,
                        status_line,
                    });
                }
            }
            Reduction::Extracted(job) => {
                tracing::info!(key = %job.key, "extracting");
                // Keep the entry until the terminal event; mark the new status.
                let updated = match self.recovery.set_status(&job.key, JobStatus::Extracting).await {
                    Ok(true) => Ok(()),
                    Ok(false) => self.recovery.put(&job).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = updated {
                    tracing::warn!(key = %job.key, "recovery update failed: {e:#}");
                }
            }
            Reduction::Cancelled(key) => {
                self.drop_recovery(&key).await;
                // Engine-side cancellation without a local cancel still frees the slot.
                if let Some(p @ (Partition::Downloading | Partition::Extracting)) =
                    self.partitions.locate(&key)
                {
                    if let Err(e) = self.partitions.move_job(&key, p, Partition::Failed) {
                        tracing::warn!("{e}");
                    }
                }
                tracing::info!(key = %key, "transfer cancelled");
            }
            Reduction::Finished(job) => {
                self.drop_recovery(&job.key).await;
                tracing::info!(key = %job.key, name = %job.name, "completed");
                self.finalize(job).await;
            }
            Reduction::Failed { job, reason } => {
                self.drop_recovery(&job.key).await;
                tracing::warn!(key = %job.key, "transfer failed: {reason}");
            }
        }
        self.pump().await;
        self.publish();
    }

    /// Local-first cancel. Queued jobs are simply removed; in-flight jobs get a
    /// best-effort engine abort and move to `failed` immediately.
    pub async fn cancel(&mut self, key: &JobKey) -> Result<(), JobError> {
        match self.partitions.locate(key) {
            Some(Partition::Queue) => {
                self.partitions.take(Partition::Queue, key);
                tracing::info!(key = %key, "removed from queue");
            }
            Some(p @ (Partition::Downloading | Partition::Extracting)) => {
                self.engine.cancel_transfer(key);
                self.partitions.move_job(key, p, Partition::Failed)?;
                self.reducer.forget(key);
                self.drop_recovery(key).await;
                tracing::info!(key = %key, "cancelled");
            }
            Some(other) => {
                return Err(JobError::WrongPartition {
                    key: key.clone(),
                    expected: JobStatus::Downloading,
                    actual: other.status(),
                })
            }
            None => return Err(JobError::UnknownKey(key.clone())),
        }
        self.pump().await;
        self.publish();
        Ok(())
    }

    /// Remove a job from `completed` or `failed`.
    pub fn clear(&mut self, key: &JobKey) -> Result<JobRecord, JobError> {
        let job = match self.partitions.locate(key) {
            Some(p @ (Partition::Completed | Partition::Failed)) => self
                .partitions
                .take(p, key)
                .ok_or_else(|| JobError::UnknownKey(key.clone()))?,
            Some(other) => {
                return Err(JobError::WrongPartition {
                    key: key.clone(),
                    expected: JobStatus::Completed,
                    actual: other.status(),
                })
            }
            None => return Err(JobError::UnknownKey(key.clone())),
        };
        self.publish();
        Ok(job)
    }

    /// Empty `completed` and `failed`. Returns the number of jobs removed.
    pub fn clear_finished(&mut self) -> usize {
        let n = self.partitions.clear_finished();
        self.publish();
        n
    }

    async fn drop_recovery(&self, key: &JobKey) {
        if let Err(e) = self.recovery.remove(key).await {
            tracing::warn!(key = %key, "recovery remove failed: {e:#}");
        }
    }

    async fn finalize(&mut self, mut job: JobRecord) {
        let opts = FinalizeOptions {
            write_redirect: self.cfg.save_source_redirect,
        };
        let outcome = storage::finalize(&mut job, &self.staging_root, opts).await;
        // Mirror fallback category/name into the tracked record.
        let (category, name) = (job.category.clone(), job.name.clone());
        self.partitions.edit(&job.key, |j| {
            j.category = category;
            j.name = name;
        });
        match outcome {
            Ok(InstallOutcome::Installed(path)) => {
                tracing::info!(key = %job.key, path = %path.display(), "installed");
                self.notify(Notice::Installed { key: job.key, path });
            }
            Ok(InstallOutcome::RootMissing) => {
                tracing::warn!(
                    key = %job.key,
                    root = %job.destination_root.display(),
                    "install root vanished, files left staged"
                );
                self.notify(Notice::InstallSkipped {
                    key: job.key,
                    reason: format!("install root {} not found", job.destination_root.display()),
                });
            }
            Ok(InstallOutcome::NothingStaged(staged)) => {
                tracing::warn!(
                    key = %job.key,
                    staged = %staged.display(),
                    "no staged files, install left untouched"
                );
                self.notify(Notice::InstallSkipped {
                    key: job.key,
                    reason: format!("nothing staged at {}", staged.display()),
                });
            }
            Err(e) => {
                tracing::warn!(key = %job.key, "finalization failed: {e:#}");
                self.notify(Notice::InstallSkipped {
                    key: job.key,
                    reason: format!("{e:#}"),
                });
            }
        }
    }
}
