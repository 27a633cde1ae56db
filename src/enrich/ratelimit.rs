//! Persisted rate limiter for enrichment providers.
//!
//! spec.md's REDESIGN FLAGS call for replacing timestamp-file rate limiting
//! with a token-bucket inside the enrichment lock, persisting only the
//! last-success timestamp for cross-process carry-over. Grounded on the
//! teacher's `cache.rs` file-backed single-value persistence idiom (a small
//! on-disk marker read at startup, written back after use), reused here for
//! one `u64` timestamp instead of a keyed entry map.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Minimum spacing between calls to a single provider (spec §4.6: "at least
/// 60/RATE_LIMIT seconds between calls").
pub struct RateLimiter {
    marker_path: PathBuf,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(marker_path: PathBuf, calls_per_minute: u32) -> Self {
        let calls_per_minute = calls_per_minute.max(1);
        RateLimiter {
            marker_path,
            min_interval: Duration::from_secs_f64(60.0 / calls_per_minute as f64),
        }
    }

    fn last_call(&self) -> Option<SystemTime> {
        let text = std::fs::read_to_string(&self.marker_path).ok()?;
        let secs: u64 = text.trim().parse().ok()?;
        Some(UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn record_call(&self, at: SystemTime) {
        if let Some(parent) = self.marker_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(secs) = at.duration_since(UNIX_EPOCH) {
            let _ = std::fs::write(&self.marker_path, secs.as_secs().to_string());
        }
    }

    /// Block the current thread until the minimum interval since the last
    /// recorded call has elapsed, then record this call. Meant to be
    /// invoked while holding the process-wide enrichment lock (spec §4.8)
    /// so concurrent workers serialize on the same provider.
    pub fn throttle(&self) {
        if let Some(last) = self.last_call() {
            if let Ok(elapsed) = SystemTime::now().duration_since(last) {
                if elapsed < self.min_interval {
                    let wait = self.min_interval - elapsed;
                    debug!("rate limit: sleeping {wait:?} before next call");
                    thread::sleep(wait);
                }
            }
        }
        self.record_call(SystemTime::now());
    }
}

pub fn marker_path_for(cache_dir: &Path, provider_name: &str) -> PathBuf {
    cache_dir.join(format!(".{provider_name}_last_call"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_call_does_not_block() {
        let dir = tempdir().unwrap();
        let limiter = RateLimiter::new(dir.path().join("marker"), 60);
        let start = SystemTime::now();
        limiter.throttle();
        assert!(start.elapsed().unwrap() < Duration::from_millis(200));
    }

    #[test]
    fn second_call_waits_out_the_interval() {
        let dir = tempdir().unwrap();
        // 6000/min => 10ms interval, keeps the test fast.
        let limiter = RateLimiter::new(dir.path().join("marker"), 6000);
        limiter.throttle();
        let start = SystemTime::now();
        limiter.throttle();
        assert!(start.elapsed().unwrap() >= Duration::from_millis(5));
    }
}
