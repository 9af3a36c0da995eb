//! Entry CRUD: put, set_status, get, remove, list.

use anyhow::{Context, Result};
use sqlx::Row;

use super::db::{unix_timestamp, RecoveryDb};
use crate::job::{JobKey, JobRecord, JobStatus};

/// One persisted in-flight job.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub status: JobStatus,
    pub job: JobRecord,
    /// Unix seconds of the last write.
    pub updated_at: i64,
}

impl RecoveryDb {
    /// Insert or replace the entry for `job.key`.
    pub async fn put(&self, job: &JobRecord) -> Result<()> {
        let snapshot = serde_json::to_string(job)?;
        sqlx::query(
            r#"
            INSERT INTO recovery_entries (job_key, status, snapshot_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(job_key) DO UPDATE SET
                status = excluded.status,
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(job.key.as_str())
        .bind(job.status.as_str())
        .bind(snapshot)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rewrite the stored status of an entry. Returns false if no entry exists.
    pub async fn set_status(&self, key: &JobKey, status: JobStatus) -> Result<bool> {
        let Some(mut job) = self.get(key).await? else {
            return Ok(false);
        };
        job.status = status;
        self.put(&job).await?;
        Ok(true)
    }

    /// Stored job for `key`, with its status taken from the status column.
    pub async fn get(&self, key: &JobKey) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"SELECT status, snapshot_json FROM recovery_entries WHERE job_key = ?1"#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let status: String = row.get("status");
        let json: String = row.get("snapshot_json");
        let mut job: JobRecord = serde_json::from_str(&json)
            .with_context(|| format!("decode recovery entry {key}"))?;
        job.status = JobStatus::from_str(&status);
        Ok(Some(job))
    }

    /// Delete the entry for `key`. Returns true if one existed.
    pub async fn remove(&self, key: &JobKey) -> Result<bool> {
        let res = sqlx::query(r#"DELETE FROM recovery_entries WHERE job_key = ?1"#)
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// All entries, oldest write first. Rows that fail to decode are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<RecoveryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT job_key, status, snapshot_json, updated_at
            FROM recovery_entries
            ORDER BY updated_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("job_key");
            let status: String = row.get("status");
            let json: String = row.get("snapshot_json");
            let updated_at: i64 = row.get("updated_at");
            let mut job: JobRecord = match serde_json::from_str(&json) {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(key = %key, "skipping unreadable recovery entry: {e}");
                    continue;
                }
            };
            let status = JobStatus::from_str(&status);
            job.status = status;
            out.push(RecoveryEntry {
                status,
                job,
                updated_at,
            });
        }
        Ok(out)
    }
}
