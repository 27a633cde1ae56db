//! Process-wide instance lock (spec §5, §4.8).
//!
//! Grounded on the teacher's `cache.rs` file-backed state idiom (a
//! `OnceLock`-guarded singleton reading/writing a small marker file); the
//! PID+age liveness semantics below are new, per spec §5.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::AppError;

/// How long a lock file may be held before it's considered stale if the
/// owning PID is no longer alive (spec §5).
const STALE_AGE: Duration = Duration::from_secs(30 * 60);
/// Total time to wait for a contended lock before giving up (spec §5).
const WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Poll interval while waiting (spec §5).
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How often to log that we're still waiting (spec §5).
const LOG_INTERVAL: Duration = Duration::from_secs(10);

/// A held advisory lock; releases (deletes the lock file) on drop.
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquire the process-wide instance lock at `lock_path`, waiting up to
    /// `WAIT_TIMEOUT` if another live instance holds it. If `force` is set,
    /// any existing lock is removed unconditionally (spec §6 `force-unlock`).
    pub fn acquire_instance_lock(lock_path: &Path, force: bool) -> Result<FileLock, AppError> {
        if force {
            let _ = fs::remove_file(lock_path);
        }

        let start = Instant::now();
        let mut last_log = Instant::now();

        loop {
            match try_create_lock(lock_path) {
                Ok(()) => return Ok(FileLock { path: lock_path.to_path_buf() }),
                Err(_) => {
                    if let Some(holder) = read_lock_holder(lock_path) {
                        if !pid_is_alive(holder.pid) || holder.age() > STALE_AGE {
                            tracing::warn!(
                                pid = holder.pid,
                                "removing stale lock file at {}",
                                lock_path.display()
                            );
                            let _ = fs::remove_file(lock_path);
                            continue;
                        }
                    } else {
                        // Unreadable/corrupt lock file: treat as stale.
                        let _ = fs::remove_file(lock_path);
                        continue;
                    }

                    if start.elapsed() > WAIT_TIMEOUT {
                        return Err(AppError::LockHeld(format!(
                            "{} held by another instance after {:?}",
                            lock_path.display(),
                            WAIT_TIMEOUT
                        )));
                    }
                    if last_log.elapsed() > LOG_INTERVAL {
                        tracing::info!("waiting for lock at {}", lock_path.display());
                        last_log = Instant::now();
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    /// Acquire a simple sibling `<path>.lock` advisory lock used to
    /// serialize writes to a shared file (e.g. the log file).
    pub fn acquire_sibling(path: &Path) -> Result<FileLock, AppError> {
        let lock_path = sibling_lock_path(path);
        // Best-effort: logging must not fail process start over contention.
        for _ in 0..50 {
            if try_create_lock(&lock_path).is_ok() {
                return Ok(FileLock { path: lock_path });
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        Ok(FileLock { path: lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn sibling_lock_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

struct LockHolder {
    pid: u32,
    started_at: SystemTime,
}

impl LockHolder {
    fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or(Duration::ZERO)
    }
}

fn try_create_lock(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)?;
    let pid = std::process::id();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let user_host = user_at_host();
    let argv0 = std::env::args().next().unwrap_or_default();
    writeln!(file, "{pid}\n{now}\n{user_host}\n{argv0}")?;
    Ok(())
}

/// Best-effort `user@host` for the lock file's diagnostic third line (spec
/// §5: `pid\ntimestamp\nuser@host\nargv0`). Never fails lock acquisition.
fn user_at_host() -> String {
    let user = std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_default();
    let host = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok().map(|s| s.trim().to_string()))
        .unwrap_or_default();
    format!("{user}@{host}")
}

fn read_lock_holder(path: &Path) -> Option<LockHolder> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    let mut lines = contents.lines();
    let pid: u32 = lines.next()?.trim().parse().ok()?;
    let started_secs: u64 = lines.next()?.trim().parse().ok()?;
    Some(LockHolder {
        pid,
        started_at: UNIX_EPOCH + Duration::from_secs(started_secs),
    })
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("instance.lock");
        {
            let _lock = FileLock::acquire_instance_lock(&lock_path, false).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
        let _lock2 = FileLock::acquire_instance_lock(&lock_path, false).unwrap();
    }

    #[test]
    fn force_removes_existing_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("instance.lock");
        fs::write(&lock_path, "999999\n0").unwrap();
        let _lock = FileLock::acquire_instance_lock(&lock_path, true).unwrap();
    }
}
