//! Types for a single download-and-install job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Globally unique job key. Assigned at intake, stable for the job's lifetime,
/// and used to correlate transfer engine events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `<unix millis><title><mod id><file id>`.
    pub fn derive(created_at_millis: u128, title: &str, mod_id: &str, file_id: &str) -> Self {
        Self(format!("{created_at_millis}{title}{mod_id}{file_id}"))
    }

    /// Same key with a `-n` suffix, used when the derived key is already taken.
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status. Mirrors the partition the job resides in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Extracting,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Extracting => "extracting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse a stored status string. Unknown values map to `Failed`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "downloading" => JobStatus::Downloading,
            "extracting" => JobStatus::Extracting,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One install job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub key: JobKey,
    /// Target title identifier (e.g. "GI").
    pub title: String,
    /// Install root for `title`. Empty until the conflict check resolves it.
    #[serde(default)]
    pub destination_root: PathBuf,
    pub category: String,
    /// Human display name; also the install directory name.
    pub name: String,
    /// Catalog page the job came from (used for retry and the redirect document).
    pub source_url: String,
    /// Archive URL handed to the transfer engine.
    pub transfer_url: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Archive entry filename as published in the catalog.
    pub archive_name: String,
    /// Layout flag snapshotted when the job completes.
    #[serde(default)]
    pub categorized: Option<bool>,
    pub status: JobStatus,
}

impl JobRecord {
    /// Directory the job installs into: root, then category when categorized, then name.
    pub fn install_dir(&self, categorized: bool) -> PathBuf {
        let mut path = self.destination_root.clone();
        if categorized && !self.category.is_empty() {
            path.push(&self.category);
        }
        path.push(&self.name);
        path
    }

    /// Installed from a local archive rather than a catalog download.
    pub fn is_local(&self) -> bool {
        self.source_url.is_empty()
    }
}

/// Errors from partition bookkeeping.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {0} is already tracked")]
    DuplicateKey(JobKey),
    #[error("job {0} is not tracked")]
    UnknownKey(JobKey),
    #[error("job {key} is {actual}, expected {expected}")]
    WrongPartition {
        key: JobKey,
        expected: JobStatus,
        actual: JobStatus,
    },
}
