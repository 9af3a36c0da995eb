use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Lowest and highest accepted values for `concurrency_limit`.
pub const MIN_CONCURRENCY: u32 = 1;
pub const MAX_CONCURRENCY: u32 = 99;

/// Global configuration loaded from `~/.config/mdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdmConfig {
    /// Install root per title (e.g. `WW = "/games/WWMI/Mods"`). Empty or missing means unset.
    #[serde(default)]
    pub destination_roots: BTreeMap<String, PathBuf>,
    /// Maximum number of jobs in the `downloading` partition.
    pub concurrency_limit: u32,
    /// Install into `<root>/<category>/<name>` instead of `<root>/<name>`.
    #[serde(default)]
    pub categorized_layout: bool,
    /// Also fetch the mod's preview image alongside the archive.
    #[serde(default)]
    pub save_preview: bool,
    /// Write `open_mod_page.html` pointing back to the catalog page.
    #[serde(default)]
    pub save_source_redirect: bool,
    /// Where the transfer engine stages downloads. Defaults to the XDG cache dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// Catalog game id (as it appears in catalog URLs) to title.
    #[serde(default = "default_catalog_titles")]
    pub catalog_titles: BTreeMap<String, String>,
}

fn default_catalog_titles() -> BTreeMap<String, String> {
    [
        ("20357", "WW"),
        ("19567", "ZZ"),
        ("8552", "GI"),
        ("18366", "SR"),
        ("21842", "EF"),
    ]
    .into_iter()
    .map(|(id, title)| (id.to_string(), title.to_string()))
    .collect()
}

impl Default for MdmConfig {
    fn default() -> Self {
        Self {
            destination_roots: BTreeMap::new(),
            concurrency_limit: 1,
            categorized_layout: false,
            save_preview: true,
            save_source_redirect: false,
            staging_dir: None,
            catalog_titles: default_catalog_titles(),
        }
    }
}

impl MdmConfig {
    /// Concurrency limit clamped into `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY) as usize
    }

    /// Configured install root for `title`, or None if unset/empty.
    pub fn destination_root(&self, title: &str) -> Option<&Path> {
        self.destination_roots
            .get(title)
            .map(PathBuf::as_path)
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Title for a catalog game id, if known.
    pub fn title_for_catalog_id(&self, game_id: &str) -> Option<&str> {
        self.catalog_titles.get(game_id).map(String::as_str)
    }

    /// Staging directory: configured value, else `~/.cache/mdm/downloads`.
    pub fn staging_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.staging_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
        Ok(xdg_dirs.create_cache_directory("downloads")?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdmConfig> {
    load_or_init_at(&config_path()?)
}

/// Like `load_or_init` but at an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MdmConfig> {
    if !path.exists() {
        let default_cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: MdmConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    if cfg.effective_concurrency() as u32 != cfg.concurrency_limit {
        tracing::warn!(
            configured = cfg.concurrency_limit,
            effective = cfg.effective_concurrency(),
            "concurrency_limit out of range, clamped"
        );
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = MdmConfig::default();
        assert_eq!(cfg.concurrency_limit, 1);
        assert!(!cfg.categorized_layout);
        assert!(cfg.destination_roots.is_empty());
        assert_eq!(cfg.title_for_catalog_id("20357"), Some("WW"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = MdmConfig::default();
        cfg.destination_roots
            .insert("GI".to_string(), PathBuf::from("/games/GIMI/Mods"));
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.concurrency_limit, cfg.concurrency_limit);
        assert_eq!(
            parsed.destination_root("GI"),
            Some(Path::new("/games/GIMI/Mods"))
        );
        assert_eq!(parsed.catalog_titles, cfg.catalog_titles);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            concurrency_limit = 4
            categorized_layout = true
            save_source_redirect = true

            [destination_roots]
            WW = "/mods/ww"
            ZZ = ""
        "#;
        let cfg: MdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.effective_concurrency(), 4);
        assert!(cfg.categorized_layout);
        assert!(!cfg.save_preview);
        assert!(cfg.save_source_redirect);
        assert_eq!(cfg.destination_root("WW"), Some(Path::new("/mods/ww")));
        assert_eq!(cfg.destination_root("ZZ"), None);
        assert_eq!(cfg.destination_root("GI"), None);
        assert_eq!(cfg.title_for_catalog_id("8552"), Some("GI"));
    }

    #[test]
    fn concurrency_is_clamped() {
        let mut cfg = MdmConfig::default();
        cfg.concurrency_limit = 0;
        assert_eq!(cfg.effective_concurrency(), 1);
        cfg.concurrency_limit = 250;
        assert_eq!(cfg.effective_concurrency(), 99);
    }

    #[test]
    fn load_or_init_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.concurrency_limit, 1);
        let again = load_or_init_at(&path).unwrap();
        assert_eq!(again.catalog_titles, cfg.catalog_titles);
    }
}
