//! `mdm config` – show where the config lives and what is in effect.

use anyhow::Result;
use mdm_core::config::MdmConfig;
use std::path::Path;

pub fn run_config(cfg: &MdmConfig, path: &Path) -> Result<()> {
    println!("config file:         {}", path.display());
    println!("concurrency limit:   {}", cfg.effective_concurrency());
    println!("categorized layout:  {}", cfg.categorized_layout);
    println!("save preview:        {}", cfg.save_preview);
    println!("save source link:    {}", cfg.save_source_redirect);
    println!("staging dir:         {}", cfg.staging_root()?.display());
    for (game_id, title) in &cfg.catalog_titles {
        println!("catalog game {game_id:<7} -> {title}");
    }
    Ok(())
}
