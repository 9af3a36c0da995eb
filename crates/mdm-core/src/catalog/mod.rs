//! Catalog references and mod metadata.
//!
//! Parses catalog URLs (`.../game/<id>/mods/<id>/dl/<id>`) into a reference,
//! and defines the metadata provider seam used by intake to turn a reference
//! into a job record.

mod sanitize;

pub use sanitize::sanitize_mod_name;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::storage::UNCATEGORIZED;

/// Errors from catalog URL parsing and descriptor lookup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("not a catalog URL: {0}")]
    InvalidUrl(String),
    #[error("catalog URL has no `{segment}` segment: {url}")]
    MissingSegment { url: String, segment: &'static str },
    #[error("unknown catalog game id {0}")]
    UnknownTitle(String),
    #[error("mod {mod_id} has no file {file_id}")]
    MissingFile { mod_id: String, file_id: String },
}

/// Identifiers extracted from a catalog URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRef {
    pub game_id: String,
    pub mod_id: String,
    pub file_id: String,
}

impl CatalogRef {
    /// Parse `.../game/<gameId>/mods/<modId>/dl/<fileId>`. The segment pairs may
    /// appear in any order; custom schemes (deep links) are accepted.
    pub fn parse(url: &str) -> Result<Self, CatalogError> {
        let parsed = url::Url::parse(url).map_err(|_| CatalogError::InvalidUrl(url.to_string()))?;
        let mut segments: Vec<&str> = Vec::new();
        // Deep links like `mdm://game/...` put the first segment in the host.
        if let Some(host) = parsed.host_str() {
            segments.push(host);
        }
        segments.extend(parsed.path().split('/').filter(|s| !s.is_empty()));

        let after = |name: &'static str| -> Result<String, CatalogError> {
            segments
                .iter()
                .position(|s| *s == name)
                .and_then(|i| segments.get(i + 1))
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .ok_or_else(|| CatalogError::MissingSegment {
                    url: url.to_string(),
                    segment: name,
                })
        };

        Ok(Self {
            game_id: after("game")?,
            mod_id: after("mods")?,
            file_id: after("dl")?,
        })
    }
}

/// One downloadable file of a mod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModFile {
    pub id: String,
    pub download_url: String,
    pub file_name: String,
}

/// Mod metadata as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModDescriptor {
    pub name: String,
    /// Profile page of the mod.
    pub profile_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub super_category: Option<String>,
    #[serde(default)]
    pub files: Vec<ModFile>,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

impl ModDescriptor {
    pub fn file(&self, file_id: &str) -> Option<&ModFile> {
        self.files.iter().find(|f| f.id == file_id)
    }

    /// Category label: category, else super-category, else `Uncategorized`.
    /// Applied at intake so the collision check and the install target agree.
    pub fn category_label(&self) -> String {
        self.category
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.super_category.as_deref().filter(|c| !c.is_empty()))
            .unwrap_or(UNCATEGORIZED)
            .to_string()
    }
}

/// Resolves catalog references to mod descriptors (remote catalog lookup).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_mod(&self, reference: &CatalogRef) -> anyhow::Result<ModDescriptor>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_web_url() {
        let r = CatalogRef::parse("https://catalog.example/game/8552/mods/12345/dl/678").unwrap();
        assert_eq!(
            r,
            CatalogRef {
                game_id: "8552".into(),
                mod_id: "12345".into(),
                file_id: "678".into(),
            }
        );
    }

    #[test]
    fn parse_deep_link_any_order() {
        let r = CatalogRef::parse("mdm://mods/42/dl/7/game/20357").unwrap();
        assert_eq!(r.game_id, "20357");
        assert_eq!(r.mod_id, "42");
        assert_eq!(r.file_id, "7");
    }

    #[test]
    fn parse_rejects_incomplete() {
        assert_eq!(
            CatalogRef::parse("https://catalog.example/game/8552/mods/12345"),
            Err(CatalogError::MissingSegment {
                url: "https://catalog.example/game/8552/mods/12345".into(),
                segment: "dl",
            })
        );
        assert!(matches!(
            CatalogRef::parse("not a url"),
            Err(CatalogError::InvalidUrl(_))
        ));
    }

    #[test]
    fn category_label_fallbacks() {
        let mut d = ModDescriptor {
            name: "x".into(),
            profile_url: String::new(),
            category: Some("Skins".into()),
            super_category: Some("Characters".into()),
            files: vec![],
            preview_images: vec![],
        };
        assert_eq!(d.category_label(), "Skins");
        d.category = Some(String::new());
        assert_eq!(d.category_label(), "Characters");
        d.super_category = Some(String::new());
        assert_eq!(d.category_label(), UNCATEGORIZED);
        d.super_category = None;
        assert_eq!(d.category_label(), "Uncategorized");
    }
}
