//! Command dispatch (spec §6): `process`, `duplicates scan/report/cleanup`,
//! `cleanup empty`, `vacuum`, `force-unlock`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db::duplicates_db::{DuplicatesDb, FingerprintRow};
use crate::db::metadata_db::MetadataDb;
use crate::db::state_db::StateDb;
use crate::duplicates::{self, grouping, resolve};
use crate::error::AppError;
use crate::extract::{self, ExtractError};
use crate::lock::FileLock;
use crate::moveexec::{self, MovePlan};
use crate::worker::{pipeline, Context};

#[derive(Debug, Subcommand)]
pub enum DuplicatesCommand {
    /// (Re)scan the destination tree and rebuild the fingerprint table.
    Scan,
    /// Print the current duplicate groups without moving anything.
    Report,
    /// Quarantine every non-keeper member of every duplicate group.
    Cleanup,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full scan → classify → enrich → plan → commit pipeline.
    Process,
    #[command(subcommand)]
    Duplicates(DuplicatesCommand),
    /// Remove empty directories left behind under the source and
    /// destination roots.
    CleanupEmpty,
    /// Reclaim free pages in all three databases.
    Vacuum,
    /// Unconditionally remove the instance lock file.
    ForceUnlock,
}

fn instance_lock_path(config: &Config) -> PathBuf {
    let dir = config.state_db_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join("shelfkeeper.instance.lock")
}

/// Run `command` against `config`, returning the process exit code (spec
/// §6: `0` success, non-zero per `AppError::exit_code()`).
pub fn dispatch(command: Command, config: Config) -> i32 {
    let result = match command {
        Command::Process => run_process(config),
        Command::Duplicates(DuplicatesCommand::Scan) => run_duplicates_scan(config),
        Command::Duplicates(DuplicatesCommand::Report) => run_duplicates_report(config),
        Command::Duplicates(DuplicatesCommand::Cleanup) => run_duplicates_cleanup(config),
        Command::CleanupEmpty => run_cleanup_empty(config),
        Command::Vacuum => run_vacuum(config),
        Command::ForceUnlock => run_force_unlock(config),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!("{err}");
            err.exit_code()
        }
    }
}

/// Watch for SIGINT/SIGTERM on a dedicated thread and flip the cooperative
/// stop flag (spec §5: "signals convert into a cooperative stop flag read
/// by workers between steps"). The thread exits on its own once a signal
/// arrives; nothing to join.
fn spawn_signal_watcher(ctx: Arc<Context>) {
    std::thread::Builder::new()
        .name("shelfkeeper-signals".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("signal watcher failed to start: {e}");
                    return;
                }
            };
            rt.block_on(wait_for_termination());
            info!("termination signal received, requesting stop");
            ctx.request_stop();
        })
        .expect("failed to spawn signal watcher thread");
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime")
        .block_on(fut)
}

fn run_process(config: Config) -> Result<(), AppError> {
    let lock_path = instance_lock_path(&config);
    let _lock = FileLock::acquire_instance_lock(&lock_path, config.force_cleanup_locks)?;

    let candidates = scan_immediate_subdirectories(&config.source_dir)?;
    let ctx = Arc::new(block_on(Context::new(config))?);
    spawn_signal_watcher(Arc::clone(&ctx));

    let filtered = block_on(pipeline::filter_incremental(&ctx, candidates));
    let total = filtered.len();
    info!("{total} album directories to process");

    let report = pipeline::run(Arc::clone(&ctx), filtered);

    info!(
        "done: {} ok, {} skipped, {} needs_review, {} failed",
        report.ok, report.skipped, report.needs_review, report.failed
    );
    println!(
        "{{\"ok\":{},\"skipped\":{},\"needs_review\":{},\"failed\":{}}}",
        report.ok, report.skipped, report.needs_review, report.failed
    );
    if let Some(log_file) = &ctx.config.log_file {
        println!("log: {}", log_file.display());
    }

    Ok(())
}

/// Enumerate album candidate directories under `source_dir` (spec §4.1),
/// recursing past non-audio grouping folders and into `Disc N` subdirectories
/// of a multi-disc release (spec §8 scenario 4) so each disc is handed to
/// `extract()` as its own candidate.
fn scan_immediate_subdirectories(source_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !source_dir.is_dir() {
        return Err(AppError::ConfigInvalid(format!(
            "source_dir does not exist or is not a directory: {}",
            source_dir.display()
        )));
    }
    Ok(extract::discover_album_dirs(source_dir))
}

/// Walk the destination tree, re-extracting every leaf album directory and
/// rebuilding `audio_fingerprints` from scratch (spec §4.7's fingerprinting
/// step, run independently of `process`'s per-commit inserts — e.g. for a
/// library organized before this fingerprint table existed).
fn run_duplicates_scan(config: Config) -> Result<(), AppError> {
    let duplicates_db = block_on(DuplicatesDb::open(&config.duplicates_db_path))?;
    block_on(duplicates_db.clear_fingerprints())?;

    let mut scanned = 0u64;
    for entry in WalkDir::new(&config.destination_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let album = match extract::extract(dir, &config) {
            Ok(album) => album,
            Err(ExtractError::NoAudio) => continue,
        };

        let fingerprint = duplicates::content_fingerprint(&album);
        let metadata_hash = duplicates::metadata_hash(&album);
        let quality_score = duplicates::quality_score(&album);
        let duration_ms: u64 = album.tracks.iter().filter_map(|t| t.duration_ms).sum();

        block_on(duplicates_db.insert_fingerprint(&FingerprintRow {
            id: 0,
            album_path: dir.to_string_lossy().to_string(),
            fingerprint,
            metadata_hash,
            duration_ms: duration_ms as i64,
            file_count: album.track_count as i64,
            total_size: album.total_bytes as i64,
            quality_score,
            format: album.quality.as_path_segment().to_string(),
            avg_bitrate: album.avg_bitrate_kbps.map(|b| b as i64),
        }))?;
        scanned += 1;
    }

    info!("fingerprinted {scanned} albums under {}", config.destination_dir.display());
    Ok(())
}

fn run_duplicates_report(config: Config) -> Result<(), AppError> {
    let duplicates_db = block_on(DuplicatesDb::open(&config.duplicates_db_path))?;
    let rows = block_on(duplicates_db.all_fingerprints())?;
    let groups = grouping::group_duplicates(rows, config.duplicate_threshold, config.duration_tolerance_seconds);

    println!("{} duplicate group(s) found", groups.len());
    for (idx, group) in groups.iter().enumerate() {
        let keeper = &group.members[group.keeper_index];
        println!("group {idx}: keep {}", keeper.album_path);
        for (member_idx, member) in group.members.iter().enumerate() {
            if member_idx != group.keeper_index {
                println!("  - {}", member.album_path);
            }
        }
    }
    Ok(())
}

fn run_duplicates_cleanup(config: Config) -> Result<(), AppError> {
    let duplicates_db = block_on(DuplicatesDb::open(&config.duplicates_db_path))?;
    let rows = block_on(duplicates_db.all_fingerprints())?;
    let groups = grouping::group_duplicates(rows, config.duplicate_threshold, config.duration_tolerance_seconds);

    let mut quarantined = 0u64;
    for group in &groups {
        let keeper = &group.members[group.keeper_index];
        let plans = resolve::plan_group(group, &config.duplicates_dir, config.duration_tolerance_seconds);

        let group_hash = keeper.fingerprint.clone();
        let total_size: i64 = group.members.iter().map(|m| m.total_size).sum();
        let group_id = block_on(duplicates_db.insert_group(
            &group_hash,
            group.members.len() as i64,
            total_size,
            keeper.id,
            1.0,
            Utc::now().timestamp(),
        ))?;

        for (idx, member) in group.members.iter().enumerate() {
            block_on(duplicates_db.insert_member(group_id, member.id, idx == group.keeper_index, idx != group.keeper_index))?;
        }

        for plan in plans {
            let operation_id = Uuid::new_v4().to_string();
            let move_plan = MovePlan {
                source_dir: &plan.source_path,
                dest_dir: &plan.dest_path,
                operation_id: &operation_id,
                rename_audio_files: false,
                tracks: &[],
                source_root: &config.destination_dir,
            };
            match moveexec::execute(&move_plan, &|| false) {
                Ok(_) => {
                    if let Err(e) = resolve::write_sidecar(&plan) {
                        warn!("failed to write duplicate sidecar for {}: {e}", plan.dest_path.display());
                    }
                    quarantined += 1;
                }
                Err(e) => warn!("failed to quarantine {}: {e}", plan.source_path.display()),
            }
        }
    }

    info!("quarantined {quarantined} duplicate album(s) across {} group(s)", groups.len());
    Ok(())
}

fn run_cleanup_empty(config: Config) -> Result<(), AppError> {
    let removed_source = moveexec::cleanup_empty_dirs(&config.source_dir);
    let removed_dest = moveexec::cleanup_empty_dirs(&config.destination_dir);
    info!("removed {removed_source} empty source directories, {removed_dest} empty destination directories");
    Ok(())
}

fn run_vacuum(config: Config) -> Result<(), AppError> {
    let state_db = block_on(StateDb::open(&config.state_db_path))?;
    let metadata_db = block_on(MetadataDb::open(&config.metadata_db_path))?;
    let duplicates_db = block_on(DuplicatesDb::open(&config.duplicates_db_path))?;

    block_on(state_db.vacuum())?;
    block_on(metadata_db.vacuum())?;
    block_on(duplicates_db.vacuum())?;

    info!("vacuumed all three databases");
    Ok(())
}

fn run_force_unlock(config: Config) -> Result<(), AppError> {
    let lock_path = instance_lock_path(&config);
    let _lock = FileLock::acquire_instance_lock(&lock_path, true)?;
    info!("removed instance lock at {}", lock_path.display());
    Ok(())
}
