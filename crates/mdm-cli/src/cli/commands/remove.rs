//! `mdm remove <key>` – drop a stale recovery entry.

use anyhow::{bail, Result};
use mdm_core::job::JobKey;
use mdm_core::recovery_db::RecoveryDb;

pub async fn run_remove(db: &RecoveryDb, key: &str) -> Result<()> {
    let key = JobKey::new(key);
    if !db.remove(&key).await? {
        bail!("no recovery entry for {key}");
    }
    tracing::info!(key = %key, "recovery entry removed from CLI");
    println!("Removed entry {key}");
    Ok(())
}
