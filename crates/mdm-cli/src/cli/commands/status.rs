//! `mdm status` – list recovery entries.

use anyhow::Result;
use mdm_core::recovery_db::RecoveryDb;

pub async fn run_status(db: &RecoveryDb) -> Result<()> {
    let entries = db.list().await?;
    if entries.is_empty() {
        println!("No in-flight jobs.");
        return Ok(());
    }
    println!("{:<40} {:<12} {:<6} {}", "KEY", "STATUS", "TITLE", "NAME");
    for e in entries {
        println!(
            "{:<40} {:<12} {:<6} {}",
            e.job.key, e.status, e.job.title, e.job.name
        );
    }
    Ok(())
}
