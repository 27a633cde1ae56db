//! On-disk response cache with TTL (spec §4.6, §6): a flat directory of
//! JSON files keyed by hex-digest filenames.
//!
//! Grounded on the teacher's `cache.rs` `CacheManager` (file-backed entries
//! under a configured cache directory, keyed by id); TTL purge-on-read is
//! new per spec §4.6 ("entries older than EXPIRY_HOURS are purged on
//! read"), replacing the teacher's LRU-by-size eviction which doesn't apply
//! to a key/value response cache.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    cached_at: u64,
    payload: serde_json::Value,
}

pub struct DiskCache {
    dir: PathBuf,
    expiry: Duration,
}

impl DiskCache {
    pub fn new(dir: PathBuf, expiry_hours: u64) -> Self {
        DiskCache {
            dir,
            expiry: Duration::from_secs(expiry_hours * 3600),
        }
    }

    /// Cache key = hex digest of normalized `(artist, album, year?)` (spec
    /// §4.6).
    pub fn key(artist: &str, album: &str, year: Option<u32>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(artist.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(album.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        if let Some(y) = year {
            hasher.update(y.to_string().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read a cached value, purging it if it has expired. Any I/O or
    /// parse failure is treated as a cache miss — "writes are best-effort
    /// (cache unavailable must not fail a lookup)" extends naturally to
    /// reads (spec §4.6).
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        let envelope: CacheEnvelope = serde_json::from_str(&text).ok()?;

        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        if now.saturating_sub(envelope.cached_at) > self.expiry.as_secs() {
            debug!("cache entry {key} expired, purging");
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some(envelope.payload)
    }

    /// Best-effort write; errors are swallowed (spec §4.6).
    pub fn put(&self, key: &str, payload: &serde_json::Value) {
        if std::fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        let cached_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let envelope = CacheEnvelope { cached_at, payload: payload.clone() };
        if let Ok(text) = serde_json::to_string(&envelope) {
            let _ = std::fs::write(self.path_for(key), text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_value() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), 24);
        let key = DiskCache::key("Atom Heart", "Pure Funktion", Some(1994));
        cache.put(&key, &serde_json::json!({"ok": true}));
        assert_eq!(cache.get(&key), Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn expired_entry_is_purged() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), 0);
        let key = "somekey";
        let path = cache.path_for(key);
        let envelope = CacheEnvelope { cached_at: 0, payload: serde_json::json!({}) };
        std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();
        assert_eq!(cache.get(key), None);
        assert!(!path.exists());
    }

    #[test]
    fn missing_key_is_a_clean_miss() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), 24);
        assert_eq!(cache.get("nope"), None);
    }
}
