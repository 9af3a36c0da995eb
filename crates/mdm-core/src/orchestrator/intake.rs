//! Intake: catalog URL resolution, retry, conflict routing and decisions.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{Notice, Orchestrator};
use crate::catalog::{sanitize_mod_name, CatalogError, CatalogRef};
use crate::conflict::{
    check_conflict, rename_until_free, root_is_valid, ConflictCheck, DecisionError, DecisionId,
    ResolutionAction,
};
use crate::engine::ExtractRequest;
use crate::job::{JobError, JobKey, JobRecord, JobStatus, Partition};
use crate::storage::UNCATEGORIZED;

/// Where a candidate job ended up after the conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Enqueued,
    /// Install root unset or inaccessible: job is in `failed`, a blocking decision was raised.
    InvalidRoot(DecisionId),
    /// Collision: the job is held by the decision until it is answered.
    AwaitingDecision(DecisionId),
    /// Local archive handed straight to the engine; the job sits in `extracting`.
    Extracting,
    /// The engine refused the local archive; the job is in `failed`.
    Refused,
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

impl Orchestrator {
    /// Resolve a catalog URL into a job and route it. No job is created when
    /// the URL or the catalog lookup fails.
    pub async fn submit_url(&mut self, url: &str) -> Result<(JobKey, Routed)> {
        let reference = CatalogRef::parse(url)?;
        let title = self
            .cfg
            .title_for_catalog_id(&reference.game_id)
            .ok_or_else(|| CatalogError::UnknownTitle(reference.game_id.clone()))?
            .to_string();
        let descriptor = self
            .metadata
            .fetch_mod(&reference)
            .await
            .with_context(|| format!("resolve mod {}", reference.mod_id))?;
        let file = descriptor
            .file(&reference.file_id)
            .ok_or_else(|| CatalogError::MissingFile {
                mod_id: reference.mod_id.clone(),
                file_id: reference.file_id.clone(),
            })?;

        let key = self.fresh_key(JobKey::derive(
            unix_millis(),
            &title,
            &reference.mod_id,
            &reference.file_id,
        ));
        let source_url = if descriptor.profile_url.is_empty() {
            url.to_string()
        } else {
            descriptor.profile_url.clone()
        };
        let job = JobRecord {
            key: key.clone(),
            title,
            destination_root: PathBuf::new(),
            category: descriptor.category_label(),
            name: sanitize_mod_name(&descriptor.name),
            source_url,
            transfer_url: file.download_url.clone(),
            preview_url: descriptor.preview_images.first().cloned(),
            archive_name: file.file_name.clone(),
            categorized: None,
            status: JobStatus::Pending,
        };
        tracing::info!(key = %key, name = %job.name, title = %job.title, "intake");

        let routed = self.route(job).await;
        self.pump().await;
        self.publish();
        Ok((key, routed))
    }

    /// Take a job out of `failed` and run it through the conflict check again
    /// with its existing record and key.
    pub async fn retry(&mut self, key: &JobKey) -> Result<Routed, JobError> {
        match self.partitions.locate(key) {
            Some(Partition::Failed) => {}
            Some(other) => {
                return Err(JobError::WrongPartition {
                    key: key.clone(),
                    expected: JobStatus::Failed,
                    actual: other.status(),
                })
            }
            None => return Err(JobError::UnknownKey(key.clone())),
        }
        let job = self
            .partitions
            .take(Partition::Failed, key)
            .ok_or_else(|| JobError::UnknownKey(key.clone()))?;
        tracing::info!(key = %key, "retry");
        let routed = if job.is_local() {
            self.extract_local(job).await
        } else {
            self.route(job).await
        };
        self.pump().await;
        self.publish();
        Ok(routed)
    }

    /// Apply the user's answer to the active decision.
    pub async fn answer_decision(
        &mut self,
        id: DecisionId,
        action: ResolutionAction,
    ) -> Result<(), DecisionError> {
        let decision = self.decisions.answer(id, action)?;
        tracing::debug!(id, ?action, title = %decision.title, "decision answered");
        match (action, decision.job) {
            (ResolutionAction::Overwrite, Some(job)) => self.enqueue(job),
            (ResolutionAction::Rename, Some(mut job)) => {
                let categorized = self.cfg.categorized_layout;
                let renames = rename_until_free(&mut job, categorized, &self.partitions).await;
                tracing::info!(key = %job.key, name = %job.name, renames, "renamed to avoid collision");
                self.enqueue(job);
            }
            (ResolutionAction::Skip, Some(job)) => {
                tracing::info!(key = %job.key, "skipped existing mod");
            }
            _ => {}
        }
        self.pump().await;
        self.publish();
        Ok(())
    }

    /// Install local archives for `title`, one job each. See [`Self::install_archive`].
    pub async fn install_archives(
        &mut self,
        title: &str,
        archives: &[PathBuf],
    ) -> Vec<Result<(JobKey, Routed)>> {
        let mut out = Vec::with_capacity(archives.len());
        for archive in archives {
            let res = self.install_archive(title, archive).await;
            if let Err(e) = &res {
                tracing::warn!(archive = %archive.display(), "local install failed: {e:#}");
            }
            out.push(res);
        }
        out
    }

    /// Install a local archive into `<root>/Uncategorized/<archive stem>`,
    /// appending ` (n)` until the name is free. The job skips the queue and
    /// download slots and starts in `extracting`. Fails without creating a
    /// job when the archive is not a readable file.
    pub async fn install_archive(
        &mut self,
        title: &str,
        archive: &Path,
    ) -> Result<(JobKey, Routed)> {
        let is_file = tokio::fs::metadata(archive)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(anyhow!("archive not found: {}", archive.display()));
        }
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("archive has no file name: {}", archive.display()))?;
        let stem = file_name.split('.').next().unwrap_or_default();

        let key = self.fresh_key(JobKey::derive(unix_millis(), title, "local", &file_name));
        let job = JobRecord {
            key: key.clone(),
            title: title.to_string(),
            destination_root: PathBuf::new(),
            category: UNCATEGORIZED.to_string(),
            name: sanitize_mod_name(stem),
            source_url: String::new(),
            transfer_url: archive.display().to_string(),
            preview_url: None,
            archive_name: file_name,
            // Local installs always land under the category folder.
            categorized: Some(true),
            status: JobStatus::Pending,
        };

        let routed = self.extract_local(job).await;
        self.publish();
        Ok((key, routed))
    }

    /// Root check, free-name search and extraction for a local archive job.
    /// The archive path travels in `transfer_url`.
    async fn extract_local(&mut self, mut job: JobRecord) -> Routed {
        let root = match self.cfg.destination_root(&job.title) {
            Some(root) if root_is_valid(root).await => root.to_path_buf(),
            _ => return self.reject_invalid_root(job),
        };
        job.destination_root = root;
        let renames = rename_until_free(&mut job, true, &self.partitions).await;
        tracing::info!(key = %job.key, name = %job.name, renames, "local archive intake");

        let key = job.key.clone();
        let request = ExtractRequest {
            key: key.clone(),
            archive_path: PathBuf::from(&job.transfer_url),
            dest_root: self.staging_root.clone(),
        };
        job.status = JobStatus::Extracting;
        if let Err(e) = self.recovery.put(&job).await {
            tracing::warn!(key = %key, "recovery write failed, extracting anyway: {e:#}");
        }
        if let Err(e) = self.partitions.insert(Partition::Extracting, job) {
            tracing::warn!("cannot track local install: {e}");
            return Routed::Refused;
        }
        if let Err(e) = self.engine.extract_archive(request) {
            tracing::warn!(key = %key, "transfer engine refused archive: {e:#}");
            if let Err(e) = self
                .partitions
                .move_job(&key, Partition::Extracting, Partition::Failed)
            {
                tracing::warn!("{e}");
            }
            if let Err(e) = self.recovery.remove(&key).await {
                tracing::warn!(key = %key, "recovery remove failed: {e:#}");
            }
            return Routed::Refused;
        }
        Routed::Extracting
    }

    /// Conflict check, then queue, fail or park behind a decision.
    pub(crate) async fn route(&mut self, mut job: JobRecord) -> Routed {
        match check_conflict(&mut job, &self.cfg, &self.partitions).await {
            ConflictCheck::InvalidRoot => self.reject_invalid_root(job),
            ConflictCheck::Exists => {
                tracing::info!(key = %job.key, name = %job.name, "mod already exists");
                let decision = self.decisions.push_already_exists(job).clone();
                let id = decision.id;
                self.notify(Notice::DecisionQueued(decision));
                Routed::AwaitingDecision(id)
            }
            ConflictCheck::Clear => {
                self.enqueue(job);
                Routed::Enqueued
            }
        }
    }

    fn reject_invalid_root(&mut self, job: JobRecord) -> Routed {
        tracing::warn!(key = %job.key, title = %job.title, "install root invalid");
        let decision = self.decisions.push_invalid_root(&job.title).clone();
        let id = decision.id;
        if let Err(e) = self.partitions.insert(Partition::Failed, job) {
            tracing::warn!("cannot record rejected job: {e}");
        }
        self.notify(Notice::DecisionQueued(decision));
        Routed::InvalidRoot(id)
    }

    fn enqueue(&mut self, job: JobRecord) {
        let key = job.key.clone();
        match self.partitions.insert(Partition::Queue, job) {
            Ok(()) => tracing::debug!(key = %key, "queued"),
            Err(e) => tracing::warn!("cannot enqueue: {e}"),
        }
    }

    /// `base`, or `base-N` for the first N that no tracked or parked job uses.
    fn fresh_key(&self, base: JobKey) -> JobKey {
        let taken = |k: &JobKey| {
            self.partitions.contains(k)
                || self
                    .decisions
                    .iter()
                    .any(|d| d.job.as_ref().is_some_and(|j| &j.key == k))
        };
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = base.with_suffix(n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
