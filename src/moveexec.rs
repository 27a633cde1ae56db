//! Atomic move executor (spec §4.5): copy-to-temporary-sibling + rename,
//! crash-safe because only the temp sibling is ever written before the
//! final single-filesystem rename.
//!
//! Grounded on the teacher's `checkout.rs::CheckoutManager` (directory
//! walk + per-file copy loop, `sanitize_filename`), restructured around the
//! temp-sibling-then-rename contract spec §4.5 requires instead of the
//! teacher's cloud-chunk reassembly.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::Track;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("destination already exists: {0}")]
    DestExists(String),
    #[error("move verification failed: {0}")]
    VerifyFailed(String),
    #[error("copy failed: {0}")]
    CopyFailed(String),
    #[error("rename failed: {0}")]
    RenameFailed(String),
    #[error("source directory vanished during move: {0}")]
    SourceVanished(String),
    #[error("move cancelled")]
    Cancelled,
}

impl From<MoveError> for AppError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::DestExists(s) => AppError::DestExists(s),
            MoveError::VerifyFailed(s) => AppError::VerifyFailed(s),
            MoveError::CopyFailed(s) => AppError::CopyFailed(s),
            MoveError::RenameFailed(s) => AppError::RenameFailed(s),
            MoveError::SourceVanished(s) => AppError::SourceVanished(s),
            MoveError::Cancelled => AppError::Cancelled,
        }
    }
}

/// Per-album copy watchdog (spec §4.5, §5).
pub const COPY_WATCHDOG: Duration = Duration::from_secs(600);
/// Copy retry count and back-off on transient filesystem errors (spec §4.5).
const COPY_RETRIES: u32 = 2;
const COPY_RETRY_BACKOFF: Duration = Duration::from_secs(2);
const MAX_EMPTY_PARENT_ASCENT: u32 = 3;

/// A planned move, ready to execute or log in dry-run mode.
pub struct MovePlan<'a> {
    pub source_dir: &'a Path,
    pub dest_dir: &'a Path,
    pub operation_id: &'a str,
    pub rename_audio_files: bool,
    pub tracks: &'a [Track],
    pub source_root: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopiedFileInfo {
    pub len: u64,
    pub mtime: Option<std::time::SystemTime>,
}

/// Execute the move contract in spec §4.5. Returns the final destination
/// path on success. `should_cancel` is polled cooperatively between steps
/// (spec §5 cancellation semantics).
pub fn execute(plan: &MovePlan, should_cancel: &dyn Fn() -> bool) -> Result<PathBuf, MoveError> {
    if plan.dest_dir.exists() {
        return Err(MoveError::DestExists(plan.dest_dir.display().to_string()));
    }

    let temp_dir = temp_sibling_path(plan.dest_dir, plan.operation_id);

    if should_cancel() {
        return Err(MoveError::Cancelled);
    }

    let copied = copy_with_retry(plan.source_dir, &temp_dir, plan)?;

    if should_cancel() {
        let _ = std::fs::remove_dir_all(&temp_dir);
        return Err(MoveError::Cancelled);
    }

    verify(&temp_dir, &copied)?;

    rename_atomic(&temp_dir, plan.dest_dir)?;

    remove_source_and_cleanup(plan.source_dir, plan.source_root);

    Ok(plan.dest_dir.to_path_buf())
}

/// Log-only planning for dry-run mode (spec §4.5: "a log line is emitted
/// describing the plan").
pub fn plan_dry_run(plan: &MovePlan) {
    info!(
        "[dry-run] would move {} -> {} (operation {})",
        plan.source_dir.display(),
        plan.dest_dir.display(),
        plan.operation_id
    );
}

fn temp_sibling_path(dest_dir: &Path, operation_id: &str) -> PathBuf {
    let mut os = dest_dir.as_os_str().to_owned();
    os.push(".tmp.");
    os.push(operation_id);
    PathBuf::from(os)
}

fn copy_with_retry(
    source_dir: &Path,
    temp_dir: &Path,
    plan: &MovePlan,
) -> Result<Vec<(PathBuf, CopiedFileInfo)>, MoveError> {
    let start = Instant::now();
    let mut attempt = 0;
    loop {
        if start.elapsed() > COPY_WATCHDOG {
            let _ = std::fs::remove_dir_all(temp_dir);
            return Err(MoveError::CopyFailed(format!(
                "copy watchdog exceeded {:?}",
                COPY_WATCHDOG
            )));
        }
        match copy_tree(source_dir, temp_dir, plan) {
            Ok(copied) => return Ok(copied),
            Err(e) if attempt < COPY_RETRIES => {
                warn!("copy attempt {attempt} failed: {e}, retrying");
                let _ = std::fs::remove_dir_all(temp_dir);
                attempt += 1;
                std::thread::sleep(COPY_RETRY_BACKOFF);
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(temp_dir);
                return Err(MoveError::CopyFailed(e.to_string()));
            }
        }
    }
}

fn copy_tree(
    source_dir: &Path,
    temp_dir: &Path,
    plan: &MovePlan,
) -> std::io::Result<Vec<(PathBuf, CopiedFileInfo)>> {
    if !source_dir.exists() {
        return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "source vanished"));
    }
    std::fs::create_dir_all(temp_dir)?;

    let mut copied = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        let src_path = entry.path();
        if !src_path.is_file() {
            continue;
        }
        let file_name = target_file_name(&src_path, plan);
        let dest_path = temp_dir.join(&file_name);
        std::fs::copy(&src_path, &dest_path)?;
        copy_metadata(&src_path, &dest_path)?;

        let metadata = std::fs::metadata(&dest_path)?;
        copied.push((
            dest_path,
            CopiedFileInfo {
                len: metadata.len(),
                mtime: metadata.modified().ok(),
            },
        ));
    }
    Ok(copied)
}

fn copy_metadata(src: &Path, dest: &Path) -> std::io::Result<()> {
    let metadata = std::fs::metadata(src)?;
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(dest, mtime)?;
    std::fs::set_permissions(dest, metadata.permissions())?;
    Ok(())
}

/// Per-file rename when `rename_audio_files_on_move` is enabled: `NN -
/// {title} - {album} - {artist}.{ext}`, all-or-nothing per file (spec
/// §4.5, §9 open question: "the spec requires all-or-nothing per file").
fn target_file_name(src_path: &Path, plan: &MovePlan) -> String {
    if !plan.rename_audio_files {
        return src_path.file_name().unwrap().to_string_lossy().to_string();
    }

    let Some(track) = plan.tracks.iter().find(|t| t.file_path == src_path) else {
        return src_path.file_name().unwrap().to_string_lossy().to_string();
    };

    let (Some(number), Some(title), Some(album), Some(artist)) =
        (track.track_number, track.title.as_deref(), track.album.as_deref(), track.artist.as_deref())
    else {
        return src_path.file_name().unwrap().to_string_lossy().to_string();
    };

    let ext = track.format.extension();
    let name = format!("{number:02} - {title} - {album} - {artist}.{ext}");
    crate::paths::sanitize_component(&name)
}

fn verify(temp_dir: &Path, copied: &[(PathBuf, CopiedFileInfo)]) -> Result<(), MoveError> {
    for (path, expected) in copied {
        let metadata = std::fs::metadata(path)
            .map_err(|e| MoveError::VerifyFailed(format!("{}: {e}", path.display())))?;
        if metadata.len() != expected.len {
            let _ = std::fs::remove_dir_all(temp_dir);
            return Err(MoveError::VerifyFailed(format!(
                "size mismatch for {}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn rename_atomic(temp_dir: &Path, dest_dir: &Path) -> Result<(), MoveError> {
    if dest_dir.exists() {
        let _ = std::fs::remove_dir_all(temp_dir);
        return Err(MoveError::DestExists(dest_dir.display().to_string()));
    }
    std::fs::rename(temp_dir, dest_dir).map_err(|e| {
        let _ = std::fs::remove_dir_all(temp_dir);
        MoveError::RenameFailed(e.to_string())
    })
}

/// Standalone sweep for the `cleanup empty` CLI command (spec §6): removes
/// every empty directory under `root`, deepest first, `root` itself
/// excluded. Distinct from the per-move ascent in
/// `remove_source_and_cleanup`, which only walks the one album's direct
/// parent chain right after its own move.
pub fn cleanup_empty_dirs(root: &Path) -> usize {
    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    // Deepest first so a parent empties out only after its children are
    // already gone.
    dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    let mut removed = 0;
    for dir in dirs {
        if matches!(std::fs::read_dir(&dir), Ok(mut entries) if entries.next().is_none()) {
            if std::fs::remove_dir(&dir).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

fn remove_source_and_cleanup(source_dir: &Path, source_root: &Path) {
    if let Err(e) = std::fs::remove_dir_all(source_dir) {
        warn!("failed to remove source directory {}: {e}", source_dir.display());
        return;
    }

    let mut parent = source_dir.parent();
    for _ in 0..MAX_EMPTY_PARENT_ASCENT {
        let Some(p) = parent else { break };
        if p == source_root || !p.starts_with(source_root) {
            break;
        }
        match std::fs::read_dir(p) {
            Ok(mut entries) if entries.next().is_none() => {
                let _ = std::fs::remove_dir(p);
                parent = p.parent();
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn moves_directory_and_preserves_contents() {
        let root = tempdir().unwrap();
        let source = root.path().join("in").join("album");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("track.flac"), b"audio-bytes").unwrap();

        let dest = root.path().join("out").join("album");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        let plan = MovePlan {
            source_dir: &source,
            dest_dir: &dest,
            operation_id: "op1",
            rename_audio_files: false,
            tracks: &[],
            source_root: &root.path().join("in"),
        };

        let result = execute(&plan, &|| false).unwrap();
        assert_eq!(result, dest);
        assert!(dest.join("track.flac").exists());
        assert!(!source.exists());
    }

    #[test]
    fn refuses_to_overwrite_existing_destination() {
        let root = tempdir().unwrap();
        let source = root.path().join("in").join("album");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("track.flac"), b"x").unwrap();

        let dest = root.path().join("out").join("album");
        fs::create_dir_all(&dest).unwrap();

        let plan = MovePlan {
            source_dir: &source,
            dest_dir: &dest,
            operation_id: "op2",
            rename_audio_files: false,
            tracks: &[],
            source_root: &root.path().join("in"),
        };

        let err = execute(&plan, &|| false).unwrap_err();
        assert!(matches!(err, MoveError::DestExists(_)));
        assert!(source.exists());
    }

    #[test]
    fn no_temp_directory_left_behind_after_dest_exists_failure() {
        let root = tempdir().unwrap();
        let source = root.path().join("in").join("album");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("track.flac"), b"x").unwrap();
        let dest = root.path().join("out").join("album");
        fs::create_dir_all(&dest).unwrap();

        let plan = MovePlan {
            source_dir: &source,
            dest_dir: &dest,
            operation_id: "op3",
            rename_audio_files: false,
            tracks: &[],
            source_root: &root.path().join("in"),
        };
        let _ = execute(&plan, &|| false);
        let temp = temp_sibling_path(&dest, "op3");
        assert!(!temp.exists());
    }
}
