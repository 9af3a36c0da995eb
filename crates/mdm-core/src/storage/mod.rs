//! Finalization: commit a staged, extracted archive to its install directory.
//!
//! The transfer engine leaves extracted files under `<staging>/<job key>`.
//! On `finished` the staged tree is flattened, moved to
//! `<root>[/<category>]/<name>` (replacing whatever was there), and
//! optionally given a redirect document pointing back to the catalog page.

mod flatten;
mod redirect;

pub use flatten::{flatten_single_subfolders, DirSummary, IMAGE_EXTENSIONS};
pub use redirect::{render_redirect, REDIRECT_FILE_NAME};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::job::{JobKey, JobRecord};

/// Category assigned when the catalog provided none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Where the engine stages files for `key`.
pub fn staging_path(staging_root: &Path, key: &JobKey) -> PathBuf {
    staging_root.join(key.as_str())
}

/// Result of a finalization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(PathBuf),
    /// Install root vanished since dispatch; files stay staged.
    RootMissing,
    /// No staged directory for the job; the destination was left alone.
    NothingStaged(PathBuf),
}

/// Options read from config at finalize time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeOptions {
    pub write_redirect: bool,
}

/// Fill in fallback category and name.
pub fn apply_install_defaults(job: &mut JobRecord) {
    if job.category.is_empty() {
        job.category = UNCATEGORIZED.to_string();
    }
    if job.name.is_empty() {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        job.name = format!("Mod_{millis}");
    }
}

/// Commit the staged files of a completed job. Mutates `job` with fallback
/// category/name so the in-memory record matches what landed on disk.
pub async fn finalize(
    job: &mut JobRecord,
    staging_root: &Path,
    opts: FinalizeOptions,
) -> Result<InstallOutcome> {
    apply_install_defaults(job);

    if !crate::conflict::root_is_valid(&job.destination_root).await {
        return Ok(InstallOutcome::RootMissing);
    }

    // Never touch an existing install unless there is something to replace it with.
    let staged = staging_path(staging_root, &job.key);
    if !tokio::fs::metadata(&staged).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(InstallOutcome::NothingStaged(staged));
    }
    let levels = flatten_single_subfolders(&staged).await?;
    if levels > 0 {
        tracing::debug!(key = %job.key, levels, "flattened nested archive layout");
    }

    let categorized = job.categorized.unwrap_or(false);
    let dest = job.install_dir(categorized);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    remove_existing(&dest).await?;
    move_tree(&staged, &dest).await?;

    if opts.write_redirect && !job.is_local() {
        let html = render_redirect(&job.source_url, &job.name, &job.title, &redirect::timestamp_now());
        tokio::fs::write(dest.join(REDIRECT_FILE_NAME), html)
            .await
            .with_context(|| format!("write redirect in {}", dest.display()))?;
    }
    Ok(InstallOutcome::Installed(dest))
}

async fn remove_existing(dest: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(dest).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(dest)
            .await
            .with_context(|| format!("remove {}", dest.display())),
        Ok(_) => tokio::fs::remove_file(dest)
            .await
            .with_context(|| format!("remove {}", dest.display())),
        Err(_) => Ok(()),
    }
}

async fn move_tree_or_file(src: &Path, dest: &Path) -> Result<()> {
    if tokio::fs::metadata(src).await?.is_dir() {
        return move_tree(src, dest).await;
    }
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dest)
        .await
        .with_context(|| format!("copy {} -> {}", src.display(), dest.display()))?;
    tokio::fs::remove_file(src).await?;
    Ok(())
}

/// Rename `src` to `dest`, falling back to copy + delete across filesystems.
async fn move_tree(src: &Path, dest: &Path) -> Result<()> {
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }
    copy_tree(src, dest)
        .await
        .with_context(|| format!("move {} -> {}", src.display(), dest.display()))?;
    tokio::fs::remove_dir_all(src)
        .await
        .with_context(|| format!("remove staged {}", src.display()))?;
    Ok(())
}

async fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let mut stack = vec![(src.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                stack.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}
