//! Duplicates store (spec §3): *audio_fingerprints*, *duplicate_groups*,
//! *duplicate_members*.

use sqlx::SqlitePool;
use std::path::Path;

use crate::db::{open_pool, with_retry, DbError};

#[derive(Debug, Clone)]
pub struct DuplicatesDb {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct FingerprintRow {
    pub id: i64,
    pub album_path: String,
    pub fingerprint: String,
    pub metadata_hash: String,
    pub duration_ms: i64,
    pub file_count: i64,
    pub total_size: i64,
    pub quality_score: f64,
    pub format: String,
    pub avg_bitrate: Option<i64>,
}

impl DuplicatesDb {
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        let pool = open_pool(path).await?;
        let db = DuplicatesDb { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audio_fingerprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                album_path TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                metadata_hash TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                file_count INTEGER NOT NULL,
                total_size INTEGER NOT NULL,
                quality_score REAL NOT NULL,
                format TEXT NOT NULL,
                avg_bitrate INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS duplicate_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_hash TEXT NOT NULL UNIQUE,
                album_count INTEGER NOT NULL,
                total_size INTEGER NOT NULL,
                best_quality_id INTEGER NOT NULL,
                duplicate_score REAL NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (best_quality_id) REFERENCES audio_fingerprints (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS duplicate_members (
                group_id INTEGER NOT NULL,
                fingerprint_id INTEGER NOT NULL,
                is_recommended_keep BOOLEAN NOT NULL DEFAULT 0,
                is_marked_for_deletion BOOLEAN NOT NULL DEFAULT 0,
                PRIMARY KEY (group_id, fingerprint_id),
                FOREIGN KEY (group_id) REFERENCES duplicate_groups (id),
                FOREIGN KEY (fingerprint_id) REFERENCES audio_fingerprints (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_fingerprint(&self, row: &FingerprintRow) -> Result<i64, DbError> {
        let result = with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO audio_fingerprints (
                    album_path, fingerprint, metadata_hash, duration_ms, file_count,
                    total_size, quality_score, format, avg_bitrate
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.album_path)
            .bind(&row.fingerprint)
            .bind(&row.metadata_hash)
            .bind(row.duration_ms)
            .bind(row.file_count)
            .bind(row.total_size)
            .bind(row.quality_score)
            .bind(&row.format)
            .bind(row.avg_bitrate)
            .execute(&self.pool)
        })
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Wipe all fingerprint rows ahead of a full rescan (`duplicates scan`).
    pub async fn clear_fingerprints(&self) -> Result<(), DbError> {
        with_retry(|| sqlx::query("DELETE FROM audio_fingerprints").execute(&self.pool)).await?;
        Ok(())
    }

    pub async fn all_fingerprints(&self) -> Result<Vec<FingerprintRow>, DbError> {
        let rows: Vec<(i64, String, String, String, i64, i64, i64, f64, String, Option<i64>)> =
            with_retry(|| {
                sqlx::query_as(
                    r#"
                    SELECT id, album_path, fingerprint, metadata_hash, duration_ms,
                           file_count, total_size, quality_score, format, avg_bitrate
                    FROM audio_fingerprints
                    "#,
                )
                .fetch_all(&self.pool)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    album_path,
                    fingerprint,
                    metadata_hash,
                    duration_ms,
                    file_count,
                    total_size,
                    quality_score,
                    format,
                    avg_bitrate,
                )| FingerprintRow {
                    id,
                    album_path,
                    fingerprint,
                    metadata_hash,
                    duration_ms,
                    file_count,
                    total_size,
                    quality_score,
                    format,
                    avg_bitrate,
                },
            )
            .collect())
    }

    pub async fn insert_group(
        &self,
        group_hash: &str,
        album_count: i64,
        total_size: i64,
        best_quality_id: i64,
        duplicate_score: f64,
        created_at: i64,
    ) -> Result<i64, DbError> {
        let result = with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO duplicate_groups (
                    group_hash, album_count, total_size, best_quality_id, duplicate_score, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(group_hash) DO UPDATE SET
                    album_count = excluded.album_count,
                    total_size = excluded.total_size,
                    best_quality_id = excluded.best_quality_id,
                    duplicate_score = excluded.duplicate_score
                "#,
            )
            .bind(group_hash)
            .bind(album_count)
            .bind(total_size)
            .bind(best_quality_id)
            .bind(duplicate_score)
            .bind(created_at)
            .execute(&self.pool)
        })
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_member(
        &self,
        group_id: i64,
        fingerprint_id: i64,
        is_recommended_keep: bool,
        is_marked_for_deletion: bool,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO duplicate_members (group_id, fingerprint_id, is_recommended_keep, is_marked_for_deletion)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(group_id, fingerprint_id) DO UPDATE SET
                    is_recommended_keep = excluded.is_recommended_keep,
                    is_marked_for_deletion = excluded.is_marked_for_deletion
                "#,
            )
            .bind(group_id)
            .bind(fingerprint_id)
            .bind(is_recommended_keep)
            .bind(is_marked_for_deletion)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    /// `vacuum` CLI command (spec §6): reclaim free pages after heavy churn.
    pub async fn vacuum(&self) -> Result<(), DbError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}
