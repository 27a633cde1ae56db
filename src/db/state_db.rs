//! State store (spec §3): *processed_directories* and *processed_files*.
//! Drives incremental mode (spec §4.1).

use sqlx::SqlitePool;

use crate::db::{open_pool, with_retry, DbError};
use crate::model::ProcessStatus;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct StateDb {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct ProcessedDirectory {
    pub path: String,
    pub last_mtime: i64,
    pub content_hash: String,
    pub processed_at: i64,
    pub status: ProcessStatus,
}

impl StateDb {
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        let pool = open_pool(path).await?;
        let db = StateDb { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_directories (
                path TEXT PRIMARY KEY,
                last_mtime INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                processed_at INTEGER NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_files (
                path TEXT PRIMARY KEY,
                directory_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                processed_at INTEGER NOT NULL,
                FOREIGN KEY (directory_path) REFERENCES processed_directories (path)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a directory's recorded content hash, for incremental-mode
    /// comparison (spec §4.1).
    pub async fn lookup(&self, path: &str) -> Result<Option<ProcessedDirectory>, DbError> {
        let row = with_retry(|| {
            sqlx::query_as::<_, (String, i64, String, i64, String)>(
                "SELECT path, last_mtime, content_hash, processed_at, status FROM processed_directories WHERE path = ?",
            )
            .bind(path)
            .fetch_optional(&self.pool)
        })
        .await?;

        Ok(row.map(|(path, last_mtime, content_hash, processed_at, status)| {
            ProcessedDirectory {
                path,
                last_mtime,
                content_hash,
                processed_at,
                status: status_from_str(&status),
            }
        }))
    }

    /// Record the terminal status of a processing attempt. A row is
    /// created/overwritten exactly once per attempt (spec §3).
    pub async fn record(
        &self,
        path: &str,
        last_mtime: i64,
        content_hash: &str,
        processed_at: i64,
        status: ProcessStatus,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO processed_directories (path, last_mtime, content_hash, processed_at, status)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(path) DO UPDATE SET
                    last_mtime = excluded.last_mtime,
                    content_hash = excluded.content_hash,
                    processed_at = excluded.processed_at,
                    status = excluded.status
                "#,
            )
            .bind(path)
            .bind(last_mtime)
            .bind(content_hash)
            .bind(processed_at)
            .bind(status.as_str())
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    /// Whether `path` should be skipped under incremental mode: a prior
    /// `ok` row exists with a matching content hash (spec §4.1).
    pub async fn is_up_to_date(&self, path: &str, content_hash: &str) -> Result<bool, DbError> {
        match self.lookup(path).await? {
            Some(row) => Ok(row.status == ProcessStatus::Ok && row.content_hash == content_hash),
            None => Ok(false),
        }
    }

    /// `vacuum` CLI command (spec §6): reclaim free pages after heavy churn.
    pub async fn vacuum(&self) -> Result<(), DbError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn record_file(
        &self,
        file_path: &str,
        directory_path: &str,
        content_hash: &str,
        processed_at: i64,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO processed_files (path, directory_path, content_hash, processed_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(path) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    processed_at = excluded.processed_at
                "#,
            )
            .bind(file_path)
            .bind(directory_path)
            .bind(content_hash)
            .bind(processed_at)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }
}

fn status_from_str(s: &str) -> ProcessStatus {
    match s {
        "ok" => ProcessStatus::Ok,
        "skipped" => ProcessStatus::Skipped,
        "needs_review" => ProcessStatus::NeedsReview,
        _ => ProcessStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn records_and_detects_up_to_date() {
        let dir = tempdir().unwrap();
        let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();
        db.record("/in/album", 100, "hash1", 200, ProcessStatus::Ok)
            .await
            .unwrap();
        assert!(db.is_up_to_date("/in/album", "hash1").await.unwrap());
        assert!(!db.is_up_to_date("/in/album", "hash2").await.unwrap());
    }

    #[tokio::test]
    async fn unprocessed_directory_is_not_up_to_date() {
        let dir = tempdir().unwrap();
        let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();
        assert!(!db.is_up_to_date("/in/new", "hash").await.unwrap());
    }
}
