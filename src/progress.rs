//! Machine-readable progress stream (spec §6): `PROGRESS {...}` lines on
//! stdout, emitted once per job and once per batch boundary, gated by
//! `Config::machine_progress`.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-start epoch used for timestamps without touching `SystemTime`
/// repeatedly on the hot path.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize)]
pub struct ProgressEvent<'a> {
    pub event: &'a str,
    pub album: Option<&'a str>,
    pub processed: u64,
    pub total: u64,
    pub timestamp: u64,
}

/// Emit a `PROGRESS {...}` line to stdout if machine-readable progress is
/// enabled. No-op (and cheap) otherwise.
pub fn emit(enabled: bool, event: &str, album: Option<&str>, processed: u64, total: u64) {
    if !enabled {
        return;
    }
    SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let record = ProgressEvent {
        event,
        album,
        processed,
        total,
        timestamp,
    };
    if let Ok(json) = serde_json::to_string(&record) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "PROGRESS {json}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_does_not_panic() {
        emit(false, "album_complete", Some("Artist/Album"), 1, 10);
    }
}
