//! Metadata store (spec §3): *albums* and *move_operations*.

use sqlx::SqlitePool;
use std::path::Path;

use crate::db::{open_pool, with_retry, DbError};
use crate::model::{Album, MoveStatus};

#[derive(Debug, Clone)]
pub struct MetadataDb {
    pool: SqlitePool,
}

impl MetadataDb {
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        let pool = open_pool(path).await?;
        let db = MetadataDb { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS albums (
                id TEXT PRIMARY KEY,
                original_path TEXT NOT NULL,
                new_path TEXT,
                artist TEXT NOT NULL,
                album_title TEXT NOT NULL,
                year INTEGER,
                label TEXT,
                catalog_number TEXT,
                genre TEXT,
                track_count INTEGER NOT NULL,
                total_bytes INTEGER NOT NULL,
                avg_bitrate_kbps INTEGER,
                quality TEXT NOT NULL,
                disc_number INTEGER,
                is_compilation BOOLEAN NOT NULL DEFAULT 0,
                is_underground BOOLEAN NOT NULL DEFAULT 0,
                is_remix_heavy BOOLEAN NOT NULL DEFAULT 0,
                confidence REAL NOT NULL,
                enrichment_source TEXT,
                fingerprint TEXT NOT NULL,
                metadata_hash TEXT NOT NULL,
                move_operation_id TEXT,
                processed_at INTEGER NOT NULL,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS move_operations (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                destination TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a fresh `pending` move_operations row for a new operation id
    /// (spec §3, §4.5 step 1 is `in_progress`; callers that plan ahead of
    /// execution use `pending` via dry-run).
    pub async fn insert_move_operation(
        &self,
        id: &str,
        source: &str,
        destination: &str,
        status: MoveStatus,
        started_at: i64,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                "INSERT INTO move_operations (id, source, destination, status, started_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(source)
            .bind(destination)
            .bind(status.as_str())
            .bind(started_at)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    pub async fn update_move_operation_status(
        &self,
        id: &str,
        status: MoveStatus,
        error: Option<&str>,
        completed_at: Option<i64>,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                "UPDATE move_operations SET status = ?, error = ?, completed_at = ? WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(error)
            .bind(completed_at)
            .bind(id)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    /// Insert the canonical album record after a successful move (spec §3,
    /// §4.5 step 7).
    pub async fn insert_album(
        &self,
        id: &str,
        album: &Album,
        new_path: Option<&str>,
        move_operation_id: Option<&str>,
        processed_at: i64,
        status: &str,
    ) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query(
                r#"
                INSERT INTO albums (
                    id, original_path, new_path, artist, album_title, year, label,
                    catalog_number, genre, track_count, total_bytes, avg_bitrate_kbps,
                    quality, disc_number, is_compilation, is_underground, is_remix_heavy,
                    confidence, enrichment_source, fingerprint, metadata_hash,
                    move_operation_id, processed_at, status
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(album.source_path.to_string_lossy().to_string())
            .bind(new_path)
            .bind(&album.artist)
            .bind(&album.album_title)
            .bind(album.year)
            .bind(&album.label)
            .bind(&album.catalog_number)
            .bind(&album.genre)
            .bind(album.track_count)
            .bind(album.total_bytes as i64)
            .bind(album.avg_bitrate_kbps)
            .bind(album.quality.as_path_segment())
            .bind(album.disc_number)
            .bind(album.is_compilation)
            .bind(album.is_underground)
            .bind(album.is_remix_heavy)
            .bind(album.confidence)
            .bind(album.enrichment_source.map(|s| s.as_str()))
            .bind(&album.fingerprint)
            .bind(&album.metadata_hash)
            .bind(move_operation_id)
            .bind(processed_at)
            .bind(status)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    pub async fn update_album_new_path(&self, id: &str, new_path: &str) -> Result<(), DbError> {
        with_retry(|| {
            sqlx::query("UPDATE albums SET new_path = ? WHERE id = ?")
                .bind(new_path)
                .bind(id)
                .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    /// Count committed move operations (spec §8 invariant: committed rows
    /// equal unique destinations created).
    pub async fn count_committed(&self) -> Result<i64, DbError> {
        let (count,): (i64,) = with_retry(|| {
            sqlx::query_as("SELECT COUNT(*) FROM move_operations WHERE status = 'committed'")
                .fetch_one(&self.pool)
        })
        .await?;
        Ok(count)
    }

    /// Number of already-committed albums released under `label`, for the
    /// hybrid mode's label-priority comparison (spec §4.4).
    pub async fn count_by_label(&self, label: &str) -> Result<u32, DbError> {
        let (count,): (i64,) = with_retry(|| {
            sqlx::query_as("SELECT COUNT(*) FROM albums WHERE label = ?")
                .bind(label)
                .fetch_one(&self.pool)
        })
        .await?;
        Ok(count as u32)
    }

    /// Number of already-committed albums by `artist`, for the same
    /// comparison (spec §4.4).
    pub async fn count_by_artist(&self, artist: &str) -> Result<u32, DbError> {
        let (count,): (i64,) = with_retry(|| {
            sqlx::query_as("SELECT COUNT(*) FROM albums WHERE artist = ?")
                .bind(artist)
                .fetch_one(&self.pool)
        })
        .await?;
        Ok(count as u32)
    }

    /// `vacuum` CLI command (spec §6): reclaim free pages after heavy churn.
    pub async fn vacuum(&self) -> Result<(), DbError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn move_operation_lifecycle() {
        let dir = tempdir().unwrap();
        let db = MetadataDb::open(&dir.path().join("metadata.db")).await.unwrap();
        db.insert_move_operation("op1", "/in/a", "/out/a", MoveStatus::InProgress, 100)
            .await
            .unwrap();
        db.update_move_operation_status("op1", MoveStatus::Committed, None, Some(200))
            .await
            .unwrap();
        assert_eq!(db.count_committed().await.unwrap(), 1);
    }
}
