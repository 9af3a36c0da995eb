//! Connection setup and schema for the recovery database.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the recovery database, stored at `~/.local/state/mdm/recovery.db`.
#[derive(Clone)]
pub struct RecoveryDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl RecoveryDb {
    /// Open (or create) the default recovery database.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
        let db_path = xdg_dirs.place_state_file("recovery.db")?;
        Self::open_at(db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = RecoveryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open a private in-memory database. Contents vanish on drop.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = RecoveryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `snapshot_json` is the full serialized JobRecord; `status` is kept
        // as a column so listings don't need to parse it.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recovery_entries (
                job_key TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod uri_tests {
    use super::path_to_sqlite_uri;
    use std::path::Path;

    #[test]
    fn escapes_reserved_chars() {
        assert_eq!(
            path_to_sqlite_uri(Path::new("/tmp/my mods/#1?.db")),
            "sqlite:///tmp/my%20mods/%231%3F.db"
        );
    }
}
