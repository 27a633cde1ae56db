//! Pipeline driver (spec §4.1, §4.8): scan results go through
//! filter-by-incremental-state, enqueue, per-album extract → enrich → plan
//! → commit → record, then drain into a summary. Large collections stream
//! in batches with checkpoints at batch boundaries (spec §4.8 backpressure).

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{Context, WorkerPool};
use crate::config::Config;
use crate::db::duplicates_db::FingerprintRow;
use crate::duplicates;
use crate::enrich::{accepts, confidence_score, EnrichmentClient, Release};
use crate::error::AppError;
use crate::extract;
use crate::model::{Album, EnrichmentSource, MoveStatus, ProcessStatus};
use crate::moveexec::{self, MovePlan};
use crate::organize::{self, path_builder, ReleaseCounts};
use crate::progress;

/// Minimum and maximum streaming batch size (spec §4.8).
const BATCH_MIN: u64 = 50;
const BATCH_MAX: u64 = 500;
/// Collections larger than this are halved again on top of the normal
/// batch-size formula (spec §4.8).
const VERY_LARGE_COLLECTION: usize = 10_000;

/// Outcome of running one album through the pipeline, sent back from a
/// worker thread to the driver.
pub struct JobOutcome {
    pub album_path: PathBuf,
    pub status: ProcessStatus,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub ok: u64,
    pub skipped: u64,
    pub needs_review: u64,
    pub failed: u64,
}

impl PipelineReport {
    fn record(&mut self, status: ProcessStatus) {
        match status {
            ProcessStatus::Ok => self.ok += 1,
            ProcessStatus::Skipped => self.skipped += 1,
            ProcessStatus::NeedsReview => self.needs_review += 1,
            ProcessStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    position: usize,
    processed: u64,
    total: u64,
    timestamp: u64,
}

fn checkpoint_path(config: &Config) -> PathBuf {
    let mut path = config.state_db_path.clone();
    path.set_extension("checkpoint.json");
    path
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn write_checkpoint(config: &Config, position: usize, processed: u64, total: u64) {
    let checkpoint = Checkpoint { position, processed, total, timestamp: now_secs() };
    if let Ok(text) = serde_json::to_string(&checkpoint) {
        let _ = std::fs::write(checkpoint_path(config), text);
    }
}

/// Read back a resumable checkpoint written by a prior, interrupted run
/// (spec §4.8), if one exists.
pub fn read_checkpoint(config: &Config) -> Option<(usize, u64, u64)> {
    let text = std::fs::read_to_string(checkpoint_path(config)).ok()?;
    let checkpoint: Checkpoint = serde_json::from_str(&text).ok()?;
    Some((checkpoint.position, checkpoint.processed, checkpoint.total))
}

/// There is no system-memory-introspection crate in this stack (none of
/// the examples carry one); `memory_limit_mb` stands in for
/// `available_mem_mb` in the batch-size formula, defaulting to a generous
/// 4 GiB when unset (`0` = unbounded, spec §6).
fn available_mem_mb(config: &Config) -> u64 {
    if config.memory_limit_mb > 0 {
        config.memory_limit_mb
    } else {
        4096
    }
}

/// `min(available_mem_mb/20, cores*15)` clamped to `[50, 500]`, halved
/// again for collections over 10,000 albums (spec §4.8). Swap-pressure
/// detection is not modeled for the same reason as `available_mem_mb`
/// above.
fn batch_size(config: &Config, total_albums: usize) -> usize {
    if let Some(n) = config.batch_size_override {
        return n.max(1);
    }

    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as u64;
    let mem_mb = available_mem_mb(config);

    let mut size = (mem_mb / 20).min(cores * 15).clamp(BATCH_MIN, BATCH_MAX);
    if total_albums > VERY_LARGE_COLLECTION {
        size /= 2;
    }
    size.max(1) as usize
}

/// Filter `candidates` down to directories the incremental-mode content
/// hash says still need work (spec §4.1). Directories whose hash can't be
/// computed are kept so the worker reports the concrete I/O error.
pub async fn filter_incremental(ctx: &Context, candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    if !ctx.config.incremental {
        return candidates;
    }

    let mut remaining = Vec::with_capacity(candidates.len());
    for dir in candidates {
        let path_str = dir.to_string_lossy().to_string();
        let up_to_date = match extract::content_hash(&dir) {
            Ok(hash) => ctx.state_db.is_up_to_date(&path_str, &hash).await.unwrap_or(false),
            Err(_) => false,
        };
        if !up_to_date {
            remaining.push(dir);
        }
    }
    remaining
}

/// Run the full pipeline over `albums` (spec §4.1, §4.8): streams in
/// batches for large collections, dispatches each batch to a worker pool,
/// drains results into a running summary, and checkpoints at batch
/// boundaries.
pub fn run(ctx: Arc<Context>, albums: Vec<PathBuf>) -> PipelineReport {
    let total = albums.len() as u64;
    let worker_count = super::effective_worker_count(&ctx.config);
    let mut report = PipelineReport::default();

    let large_collection = albums.len() > ctx.config.large_collection_threshold;
    let batches: Vec<Vec<PathBuf>> = if large_collection {
        let size = batch_size(&ctx.config, albums.len());
        info!("large collection ({} albums): streaming in batches of {size}", albums.len());
        albums.chunks(size).map(|c| c.to_vec()).collect()
    } else {
        vec![albums]
    };

    let mut processed: u64 = 0;
    let mut position: usize = 0;

    'batches: for batch in batches {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (results_tx, results_rx) = mpsc::channel();
        let batch_len = batch.len();

        for path in batch {
            if jobs_tx.send(path).is_err() {
                break;
            }
        }
        drop(jobs_tx);

        let pool = WorkerPool::spawn(worker_count, Arc::clone(&ctx), jobs_rx, results_tx);

        for _ in 0..batch_len {
            let Ok(outcome) = results_rx.recv() else { break };
            if let Some(err) = &outcome.error {
                warn!("{}: {err}", outcome.album_path.display());
            }
            report.record(outcome.status);
            processed += 1;
            position += 1;
            progress::emit(
                ctx.config.machine_progress,
                "album_complete",
                Some(&outcome.album_path.to_string_lossy()),
                processed,
                total,
            );
        }

        pool.join();
        write_checkpoint(&ctx.config, position, processed, total);
        progress::emit(ctx.config.machine_progress, "batch_complete", None, processed, total);

        if ctx.should_cancel() {
            break 'batches;
        }
    }

    report
}

/// Run one album through extract → enrich → plan → commit → record (spec
/// §4.8: "within one album, all steps are strictly ordered"). Per-album
/// errors are recorded against the album and never propagate past this
/// call (spec §7).
pub async fn process_one(ctx: &Context, dir: &Path) -> JobOutcome {
    match process_one_inner(ctx, dir).await {
        Ok(status) => JobOutcome { album_path: dir.to_path_buf(), status, error: None },
        Err(err) => JobOutcome {
            album_path: dir.to_path_buf(),
            status: status_for_error(&err),
            error: Some(err.to_string()),
        },
    }
}

fn status_for_error(err: &AppError) -> ProcessStatus {
    match err {
        AppError::NoAudio => ProcessStatus::Skipped,
        AppError::MalformedSidecar(_) | AppError::ArtistInvalid(_) => ProcessStatus::NeedsReview,
        _ => ProcessStatus::Failed,
    }
}

fn mtime_of(dir: &Path) -> i64 {
    std::fs::metadata(dir)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

async fn record_state(ctx: &Context, path: &str, hash: &str, status: ProcessStatus) {
    let now = Utc::now().timestamp();
    let guard = ctx.db_lock.lock().unwrap();
    if let Err(e) = ctx.state_db.record(path, mtime_of(Path::new(path)), hash, now, status).await {
        warn!("failed to record state for {path}: {e}");
    }
    drop(guard);
}

async fn process_one_inner(ctx: &Context, dir: &Path) -> Result<ProcessStatus, AppError> {
    if ctx.should_cancel() {
        return Err(AppError::Cancelled);
    }

    let path_str = dir.to_string_lossy().to_string();
    let hash = extract::content_hash(dir)?;

    if ctx.config.incremental && ctx.state_db.is_up_to_date(&path_str, &hash).await? {
        return Ok(ProcessStatus::Skipped);
    }

    let mut album = match extract::extract(dir, &ctx.config) {
        Ok(album) => album,
        Err(e) => {
            let app_err: AppError = e.into();
            record_state(ctx, &path_str, &hash, status_for_error(&app_err)).await;
            return Err(app_err);
        }
    };

    album.is_underground = organize::is_underground(&album, &ctx.config);
    album.is_remix_heavy = organize::is_remix_heavy(&album, &ctx.config);

    enrich_album(ctx, &mut album).await;

    album.fingerprint = duplicates::content_fingerprint(&album);
    album.metadata_hash = duplicates::metadata_hash(&album);
    let quality_score = duplicates::quality_score(&album);

    let counts = release_counts(ctx, &album).await?;
    let mode = organize::determine_mode(&album, &ctx.config, counts);
    let rel_path = path_builder::build_path(&album, mode, &ctx.config.various_artists_sentinel);
    let dest_dir = ctx.config.destination_dir.join(&rel_path);

    if ctx.config.dry_run {
        let plan = MovePlan {
            source_dir: dir,
            dest_dir: &dest_dir,
            operation_id: "dry-run",
            rename_audio_files: ctx.config.rename_audio_files_on_move,
            tracks: &album.tracks,
            source_root: &ctx.config.source_dir,
        };
        moveexec::plan_dry_run(&plan);
        return Ok(ProcessStatus::Ok);
    }

    commit_album(ctx, dir, &path_str, &hash, &dest_dir, &album, quality_score).await
}

async fn commit_album(
    ctx: &Context,
    dir: &Path,
    path_str: &str,
    hash: &str,
    dest_dir: &Path,
    album: &Album,
    quality_score: f64,
) -> Result<ProcessStatus, AppError> {
    let operation_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().timestamp();

    {
        let guard = ctx.db_lock.lock().unwrap();
        ctx.metadata_db
            .insert_move_operation(&operation_id, path_str, &dest_dir.to_string_lossy(), MoveStatus::InProgress, started_at)
            .await?;
        drop(guard);
    }

    let plan = MovePlan {
        source_dir: dir,
        dest_dir,
        operation_id: &operation_id,
        rename_audio_files: ctx.config.rename_audio_files_on_move,
        tracks: &album.tracks,
        source_root: &ctx.config.source_dir,
    };

    match moveexec::execute(&plan, &|| ctx.should_cancel()) {
        Ok(final_path) => {
            let completed_at = Utc::now().timestamp();
            let guard = ctx.db_lock.lock().unwrap();

            ctx.metadata_db
                .update_move_operation_status(&operation_id, MoveStatus::Committed, None, Some(completed_at))
                .await?;

            let album_id = Uuid::new_v4().to_string();
            ctx.metadata_db
                .insert_album(
                    &album_id,
                    album,
                    Some(&final_path.to_string_lossy()),
                    Some(&operation_id),
                    completed_at,
                    ProcessStatus::Ok.as_str(),
                )
                .await?;

            ctx.duplicates_db
                .insert_fingerprint(&FingerprintRow {
                    id: 0,
                    album_path: final_path.to_string_lossy().to_string(),
                    fingerprint: album.fingerprint.clone(),
                    metadata_hash: album.metadata_hash.clone(),
                    duration_ms: album.tracks.iter().filter_map(|t| t.duration_ms).sum::<u64>() as i64,
                    file_count: album.track_count as i64,
                    total_size: album.total_bytes as i64,
                    quality_score,
                    format: album.quality.as_path_segment().to_string(),
                    avg_bitrate: album.avg_bitrate_kbps.map(|b| b as i64),
                })
                .await?;

            // The state-store write marking this directory `ok` is the last
            // write of the transaction that committed the move (spec §4.8):
            // if the process dies before this line, the next incremental
            // scan recomputes the content hash, finds the source gone, and
            // records a terminal status on its own.
            ctx.state_db.record(path_str, mtime_of(dir), hash, completed_at, ProcessStatus::Ok).await?;

            drop(guard);
            Ok(ProcessStatus::Ok)
        }
        Err(move_err) => {
            let completed_at = Utc::now().timestamp();
            let guard = ctx.db_lock.lock().unwrap();
            let _ = ctx
                .metadata_db
                .update_move_operation_status(&operation_id, MoveStatus::Failed, Some(&move_err.to_string()), Some(completed_at))
                .await;
            drop(guard);
            Err(move_err.into())
        }
    }
}

async fn release_counts(ctx: &Context, album: &Album) -> Result<ReleaseCounts, AppError> {
    let artist_releases = ctx.metadata_db.count_by_artist(&album.artist).await?;
    let label_releases = match &album.label {
        Some(label) => ctx.metadata_db.count_by_label(label).await?,
        None => 0,
    };
    Ok(ReleaseCounts { label_releases, artist_releases })
}

/// Try the primary provider, then the secondary, applying whichever
/// release clears its configured confidence threshold first (spec §4.6).
/// Extracted-only fields already present on `album` are never overwritten.
async fn enrich_album(ctx: &Context, album: &mut Album) {
    if let Some(client) = ctx.primary.as_deref() {
        if let Some(release) = try_enrich_with(
            client,
            &ctx.primary_cache,
            &ctx.primary_limiter,
            &ctx.enrichment_lock,
            &album.artist,
            &album.album_title,
            album.year,
            ctx.config.primary.confidence_threshold,
        )
        .await
        {
            apply_release(album, release, EnrichmentSource::Primary);
            return;
        }
    }

    if let Some(client) = ctx.secondary.as_deref() {
        if let Some(release) = try_enrich_with(
            client,
            &ctx.secondary_cache,
            &ctx.secondary_limiter,
            &ctx.enrichment_lock,
            &album.artist,
            &album.album_title,
            album.year,
            ctx.config.secondary.confidence_threshold,
        )
        .await
        {
            apply_release(album, release, EnrichmentSource::Secondary);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn try_enrich_with(
    client: &dyn EnrichmentClient,
    cache: &crate::enrich::cache::DiskCache,
    limiter: &crate::enrich::ratelimit::RateLimiter,
    enrichment_lock: &Mutex<()>,
    artist: &str,
    album_title: &str,
    year: Option<u32>,
    threshold: f64,
) -> Option<Release> {
    let key = crate::enrich::cache::DiskCache::key(artist, album_title, year);
    if let Some(cached) = cache.get(&key) {
        if let Ok(release) = serde_json::from_value::<Release>(cached) {
            return Some(release);
        }
    }

    // Failures here are never fatal to the pipeline (spec §4.6): any error
    // just means this album proceeds without enrichment.
    let release = {
        let guard = enrichment_lock.lock().unwrap();
        limiter.throttle();

        let candidates = client.search(artist, album_title, year).await.ok()?;
        let best = candidates
            .iter()
            .map(|c| (c, confidence_score(artist, album_title, year, c)))
            .filter(|(_, score)| accepts(*score, threshold))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())?;

        let release = client.get_release(&best.0.id).await.ok()?;
        drop(guard);
        release
    };

    if let Ok(value) = serde_json::to_value(&release) {
        cache.put(&key, &value);
    }
    Some(release)
}

fn apply_release(album: &mut Album, release: Release, source: EnrichmentSource) {
    if album.year.is_none() {
        album.year = release.year;
    }
    if album.label.is_none() {
        album.label = release.label;
    }
    if album.catalog_number.is_none() {
        album.catalog_number = release.catalog_number;
    }
    if album.genre.is_none() {
        album.genre = release.genre;
    }
    album.enrichment_source = Some(source);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_is_clamped_to_the_configured_range() {
        let mut config = Config::default();
        config.memory_limit_mb = 1;
        assert_eq!(batch_size(&config, 2000), BATCH_MIN as usize);

        config.memory_limit_mb = 1_000_000;
        assert_eq!(batch_size(&config, 2000), BATCH_MAX as usize);
    }

    #[test]
    fn explicit_override_wins() {
        let mut config = Config::default();
        config.batch_size_override = Some(77);
        assert_eq!(batch_size(&config, 2000), 77);
    }

    #[test]
    fn very_large_collections_halve_the_batch() {
        let mut config = Config::default();
        config.memory_limit_mb = 1_000_000;
        let normal = batch_size(&config, 2000);
        let huge = batch_size(&config, 20_000);
        assert_eq!(huge, normal / 2);
    }
}
