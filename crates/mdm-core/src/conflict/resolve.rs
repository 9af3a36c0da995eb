//! Collision checks and rename-on-conflict.

use std::path::Path;

use crate::config::MdmConfig;
use crate::job::{JobPartitions, JobRecord};

/// Outcome of checking a candidate job before enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCheck {
    /// Install root for the job's title is unset or inaccessible.
    InvalidRoot,
    /// Install directory is taken on disk or by another in-memory job.
    Exists,
    /// Safe to enqueue.
    Clear,
}

/// True if `root` is set and is an existing directory.
pub async fn root_is_valid(root: &Path) -> bool {
    if root.as_os_str().is_empty() {
        return false;
    }
    tokio::fs::metadata(root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// True if `job`'s install directory exists on disk, or another tracked job
/// targets the same root and name (and category, under the categorized layout).
pub async fn mod_exists(job: &JobRecord, categorized: bool, partitions: &JobPartitions) -> bool {
    let path = job.install_dir(categorized);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return true;
    }
    partitions.iter_all().any(|other| {
        other.key != job.key
            && other.destination_root == job.destination_root
            && other.name == job.name
            && (!categorized || other.category == job.category)
    })
}

/// Resolve the job's install root from config and check for collisions.
/// Sets `job.destination_root` when the root is valid.
pub async fn check_conflict(
    job: &mut JobRecord,
    cfg: &MdmConfig,
    partitions: &JobPartitions,
) -> ConflictCheck {
    let Some(root) = cfg.destination_root(&job.title) else {
        return ConflictCheck::InvalidRoot;
    };
    if !root_is_valid(root).await {
        return ConflictCheck::InvalidRoot;
    }
    job.destination_root = root.to_path_buf();
    if mod_exists(job, cfg.categorized_layout, partitions).await {
        ConflictCheck::Exists
    } else {
        ConflictCheck::Clear
    }
}

/// Append ` (1)`, ` (2)`, ... to the job's original name until no collision
/// remains, re-checking disk and live jobs on every increment. Returns the
/// number of renames applied.
pub async fn rename_until_free(
    job: &mut JobRecord,
    categorized: bool,
    partitions: &JobPartitions,
) -> u32 {
    let initial = job.name.clone();
    let mut counter = 0;
    while mod_exists(job, categorized, partitions).await {
        counter += 1;
        job.name = format!("{initial} ({counter})");
    }
    counter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKey, JobStatus, Partition};
    use std::path::PathBuf;

    fn job(key: &str, root: &Path, name: &str) -> JobRecord {
        JobRecord {
            key: JobKey::new(key),
            title: "GI".into(),
            destination_root: root.to_path_buf(),
            category: "Characters".into(),
            name: name.into(),
            source_url: String::new(),
            transfer_url: String::new(),
            preview_url: None,
            archive_name: String::new(),
            categorized: None,
            status: JobStatus::Pending,
        }
    }

    fn cfg_with_root(root: &Path) -> MdmConfig {
        let mut cfg = MdmConfig::default();
        cfg.destination_roots
            .insert("GI".to_string(), root.to_path_buf());
        cfg
    }

    #[tokio::test]
    async fn unset_or_missing_root_is_invalid() {
        let partitions = JobPartitions::new();
        let mut j = job("a", Path::new(""), "X");
        assert_eq!(
            check_conflict(&mut j, &MdmConfig::default(), &partitions).await,
            ConflictCheck::InvalidRoot
        );

        let cfg = cfg_with_root(Path::new("/definitely/not/here/mdm"));
        assert_eq!(
            check_conflict(&mut j, &cfg, &partitions).await,
            ConflictCheck::InvalidRoot
        );
        assert_eq!(j.destination_root, PathBuf::new());
    }

    #[tokio::test]
    async fn clear_sets_destination_root() {
        let dir = tempfile::tempdir().unwrap();
        let partitions = JobPartitions::new();
        let mut j = job("a", Path::new(""), "X");
        let cfg = cfg_with_root(dir.path());
        assert_eq!(
            check_conflict(&mut j, &cfg, &partitions).await,
            ConflictCheck::Clear
        );
        assert_eq!(j.destination_root, dir.path());
    }

    #[tokio::test]
    async fn detects_on_disk_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Sword Mod")).unwrap();
        let mut j = job("a", Path::new(""), "Sword Mod");
        let cfg = cfg_with_root(dir.path());
        assert_eq!(
            check_conflict(&mut j, &cfg, &JobPartitions::new()).await,
            ConflictCheck::Exists
        );
    }

    #[tokio::test]
    async fn detects_in_memory_collision() {
        let dir = tempfile::tempdir().unwrap();
        let mut partitions = JobPartitions::new();
        partitions
            .insert(Partition::Downloading, job("other", dir.path(), "X"))
            .unwrap();
        let mut j = job("a", Path::new(""), "X");
        let cfg = cfg_with_root(dir.path());
        assert_eq!(
            check_conflict(&mut j, &cfg, &partitions).await,
            ConflictCheck::Exists
        );
    }

    #[tokio::test]
    async fn categorized_layout_compares_category() {
        let dir = tempfile::tempdir().unwrap();
        let mut partitions = JobPartitions::new();
        let mut other = job("other", dir.path(), "X");
        other.category = "Weapons".into();
        partitions.insert(Partition::Queue, other).unwrap();

        let j = job("a", dir.path(), "X");
        assert!(mod_exists(&j, false, &partitions).await);
        assert!(!mod_exists(&j, true, &partitions).await);
    }

    #[tokio::test]
    async fn rename_skips_every_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["X", "X (1)", "X (2)"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let mut j = job("a", dir.path(), "X");
        let renames = rename_until_free(&mut j, false, &JobPartitions::new()).await;
        assert_eq!(j.name, "X (3)");
        assert_eq!(renames, 3);

        // Already free: nothing changes.
        assert_eq!(rename_until_free(&mut j, false, &JobPartitions::new()).await, 0);
        assert_eq!(j.name, "X (3)");
    }

    #[tokio::test]
    async fn rename_checks_live_jobs_too() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("X")).unwrap();
        let mut partitions = JobPartitions::new();
        partitions
            .insert(Partition::Queue, job("q", dir.path(), "X (1)"))
            .unwrap();
        let mut j = job("a", dir.path(), "X");
        rename_until_free(&mut j, false, &partitions).await;
        assert_eq!(j.name, "X (2)");
    }
}
