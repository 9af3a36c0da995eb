//! `mdm roots` – report whether each title's install root is usable.

use anyhow::Result;
use mdm_core::config::MdmConfig;
use mdm_core::conflict::root_is_valid;
use std::collections::BTreeSet;

pub async fn run_roots(cfg: &MdmConfig) -> Result<()> {
    let titles: BTreeSet<&str> = cfg
        .catalog_titles
        .values()
        .map(String::as_str)
        .chain(cfg.destination_roots.keys().map(String::as_str))
        .collect();

    println!("{:<6} {:<8} {}", "TITLE", "STATE", "PATH");
    for title in titles {
        let (state, path) = match cfg.destination_root(title) {
            None => ("unset", "-".to_string()),
            Some(root) if root_is_valid(root).await => ("ok", root.display().to_string()),
            Some(root) => ("missing", root.display().to_string()),
        };
        println!("{title:<6} {state:<8} {path}");
    }
    Ok(())
}
