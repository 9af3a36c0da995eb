//! Collapse archives that wrap their content in redundant single folders.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::Path;

/// Extensions ignored when deciding whether a directory is a plain wrapper.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Shape of one directory level.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirSummary {
    pub entries: usize,
    pub txt_files: usize,
    pub image_files: usize,
    pub ini_files: usize,
    pub dirs: Vec<OsString>,
}

impl DirSummary {
    pub async fn read(dir: &Path) -> Result<Self> {
        let mut summary = DirSummary::default();
        let mut rd = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("read dir {}", dir.display()))?;
        while let Some(entry) = rd.next_entry().await? {
            summary.entries += 1;
            let name = entry.file_name();
            if entry.file_type().await?.is_dir() {
                summary.dirs.push(name);
                continue;
            }
            let ext = Path::new(&name)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            match ext.as_deref() {
                Some("txt") => summary.txt_files += 1,
                Some("ini") => summary.ini_files += 1,
                Some(e) if IMAGE_EXTENSIONS.contains(&e) => summary.image_files += 1,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// One meaningful entry, it is a directory, and no `.ini` sits beside it.
    pub fn is_wrapper(&self) -> bool {
        self.entries - self.txt_files - self.image_files == 1
            && self.ini_files == 0
            && self.dirs.len() == 1
    }
}

/// Repeatedly hoist the contents of a lone subdirectory into `dir`.
/// Returns how many levels were removed.
pub async fn flatten_single_subfolders(dir: &Path) -> Result<u32> {
    let mut levels = 0;
    let mut summary = DirSummary::read(dir).await?;
    while summary.is_wrapper() {
        let child = dir.join(&summary.dirs[0]);
        // Park the child under a fresh name so an inner entry sharing its name can't clash.
        let parked = dir.join(format!(".mdm_flatten_{levels}"));
        tokio::fs::rename(&child, &parked)
            .await
            .with_context(|| format!("rename {}", child.display()))?;
        let mut rd = tokio::fs::read_dir(&parked).await?;
        while let Some(entry) = rd.next_entry().await? {
            let target = dir.join(entry.file_name());
            super::remove_existing(&target).await?;
            super::move_tree_or_file(&entry.path(), &target).await?;
        }
        tokio::fs::remove_dir_all(&parked).await?;
        levels += 1;
        summary = DirSummary::read(dir).await?;
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, b"").unwrap();
    }

    #[tokio::test]
    async fn flattens_nested_wrappers() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/b/c/mod.ini");
        touch(dir.path(), "a/b/c/tex.dds");
        touch(dir.path(), "preview.png");
        touch(dir.path(), "a/notes.txt");

        let levels = flatten_single_subfolders(dir.path()).await.unwrap();
        assert_eq!(levels, 3);
        assert!(dir.path().join("mod.ini").is_file());
        assert!(dir.path().join("tex.dds").is_file());
        assert!(dir.path().join("notes.txt").is_file());
        assert!(dir.path().join("preview.png").is_file());
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn stops_at_irregular_layout() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/one/mod.ini");
        touch(dir.path(), "a/two/mod.ini");
        assert_eq!(flatten_single_subfolders(dir.path()).await.unwrap(), 1);
        assert!(dir.path().join("one/mod.ini").is_file());
        assert!(dir.path().join("two/mod.ini").is_file());
    }

    #[tokio::test]
    async fn ini_beside_folder_blocks_flatten() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "root.ini");
        touch(dir.path(), "sub/mod.ini");
        assert_eq!(flatten_single_subfolders(dir.path()).await.unwrap(), 0);
        assert!(dir.path().join("sub/mod.ini").is_file());
    }

    #[tokio::test]
    async fn inner_entry_named_like_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Mod/Mod/a.ini");
        touch(dir.path(), "Mod/Mod/b.ini");
        assert_eq!(flatten_single_subfolders(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("a.ini").is_file());
        assert!(dir.path().join("b.ini").is_file());
    }

    #[tokio::test]
    async fn summary_counts_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A.PNG");
        touch(dir.path(), "b.Txt");
        touch(dir.path(), "c.INI");
        let s = DirSummary::read(dir.path()).await.unwrap();
        assert_eq!((s.image_files, s.txt_files, s.ini_files), (1, 1, 1));
        assert!(!s.is_wrapper());
    }
}
