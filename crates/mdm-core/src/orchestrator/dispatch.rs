//! Admission plus dispatch to the transfer engine.

use super::Orchestrator;
use crate::engine::TransferRequest;
use crate::job::{JobRecord, Partition};

/// File name the preview side-fetch is stored under.
pub const PREVIEW_FILE_NAME: &str = "preview";

impl Orchestrator {
    /// Admit queued jobs up to the limit and dispatch each one. Repeats while
    /// dispatch failures keep freeing slots.
    pub(crate) async fn pump(&mut self) {
        loop {
            let admitted = self.admission.admit(&mut self.partitions);
            if admitted.is_empty() {
                break;
            }
            for job in admitted {
                self.dispatch(job).await;
            }
        }
    }

    async fn dispatch(&mut self, job: JobRecord) {
        // Recovery entry goes first so a crash before the first event still finds the job.
        if let Err(e) = self.recovery.put(&job).await {
            tracing::warn!(key = %job.key, "recovery write failed, dispatching anyway: {e:#}");
        }

        let request = TransferRequest {
            key: job.key.clone(),
            source_url: job.transfer_url.clone(),
            dest_root: self.staging_root.clone(),
            file_name: job.archive_name.clone(),
            notify: true,
        };
        if let Err(e) = self.engine.start_transfer(request) {
            tracing::warn!(key = %job.key, "transfer engine refused job: {e:#}");
            if let Err(e) =
                self.partitions
                    .move_job(&job.key, Partition::Downloading, Partition::Failed)
            {
                tracing::warn!("{e}");
            }
            if let Err(e) = self.recovery.remove(&job.key).await {
                tracing::warn!(key = %job.key, "recovery remove failed: {e:#}");
            }
            return;
        }
        tracing::info!(key = %job.key, name = %job.name, "dispatched");

        if self.cfg.save_preview {
            if let Some(preview) = &job.preview_url {
                let request = TransferRequest {
                    key: job.key.clone(),
                    source_url: preview.clone(),
                    dest_root: self.staging_root.clone(),
                    file_name: PREVIEW_FILE_NAME.to_string(),
                    notify: false,
                };
                if let Err(e) = self.engine.start_transfer(request) {
                    tracing::debug!(key = %job.key, "preview fetch not started: {e:#}");
                }
            }
        }
    }
}
