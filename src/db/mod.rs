//! Storage layer (spec §3, §5): three SQLite-backed stores sharing one
//! connection idiom.
//!
//! Grounded on the teacher's `db/client.rs` (`SqlitePool::connect` with
//! `sqlite://{path}?mode=rwc`, `CREATE TABLE IF NOT EXISTS` on startup).
//! Extended with the WAL pragmas and retry ladder spec §5 mandates, which
//! the teacher's own connection helper does not need (its single-writer
//! desktop app never contends on the same file).

pub mod duplicates_db;
pub mod metadata_db;
pub mod state_db;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database locked after retries: {0}")]
    Locked(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Locked(msg) => AppError::DbLocked(msg),
            DbError::Sqlx(e) => AppError::DbInaccessible(e.to_string()),
        }
    }
}

/// Open (creating if absent) a SQLite database with write-ahead journaling,
/// a busy-timeout of at least 10s, and memory-backed temp storage (spec §2,
/// §5).
pub async fn open_pool(path: &Path) -> Result<SqlitePool, DbError> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    info!("opening database at {}", url);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await?;

    sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout=10000").execute(&pool).await?;
    sqlx::query("PRAGMA temp_store=MEMORY").execute(&pool).await?;

    Ok(pool)
}

/// Retry ladder for "database is locked" errors: 100ms, 200ms, 400ms, up to
/// 3 attempts, per spec §5. Non-lock errors are not retried.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    const BACKOFFS_MS: [u64; 3] = [100, 200, 400];

    let mut last_err = None;
    for delay_ms in BACKOFFS_MS {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_locked_error(&e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(DbError::Sqlx(e)),
        }
    }
    Err(DbError::Locked(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

fn is_locked_error(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        let msg = db_err.message();
        return msg.contains("database is locked") || msg.contains("database table is locked");
    }
    false
}
