//! Disk-backed response cache.
//!
//! One file per key, named by the key's SHA-256 digest. Entries are judged
//! against a caller supplied reference time (`upstream_freshness >= reference`)
//! instead of their local age; local age only matters to the retention sweep.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;

/// Hex digits in a SHA-256 digest.
pub const KEY_LEN: usize = 64;

const ENTRY_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    /// Point in time up to which the payload is known to match upstream.
    pub upstream_freshness: DateTime<Utc>,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: Vec<u8>, upstream_freshness: DateTime<Utc>) -> Self {
        Self {
            payload,
            upstream_freshness,
            written_at: Utc::now(),
        }
    }

    /// Inclusive: an entry observed exactly at `reference` is still valid.
    pub fn is_fresh_for(&self, reference: DateTime<Utc>) -> bool {
        self.upstream_freshness >= reference
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache key {0:?}")]
    InvalidKey(String),
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache entry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Fixed-length key for a resource; safe to use as a file name whatever the parts contain.
pub fn cache_key(parts: &[&str]) -> String {
    common::text::digest_hex(parts)
}

pub fn is_valid_key(key: &str) -> bool {
    key.len() == KEY_LEN && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Clone, Debug)]
pub struct ResponseCache {
    root: Arc<PathBuf>,
}

impl ResponseCache {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(CacheError::io(&root))?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Any entry stored under `key`. Unreadable or undecodable files count as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        if !is_valid_key(key) {
            return None;
        }
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                metrics::CACHE_CORRUPT.inc();
                warn!(path = %path.display(), error = %err, "unreadable cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(err) => {
                metrics::CACHE_CORRUPT.inc();
                warn!(path = %path.display(), error = %err, "corrupt cache entry ignored");
                None
            }
        }
    }

    pub async fn get_fresh(&self, key: &str, reference: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = self.lookup_fresh(key, reference).await;
        if entry.is_some() {
            self.record_hit();
        } else {
            self.record_miss();
        }
        entry
    }

    /// [`Self::get_fresh`] without touching the hit/miss counters, for callers
    /// that still have to decode the payload before it counts as a hit.
    pub async fn lookup_fresh(&self, key: &str, reference: DateTime<Utc>) -> Option<CacheEntry> {
        self.get(key)
            .await
            .filter(|entry| entry.is_fresh_for(reference))
    }

    pub fn record_hit(&self) {
        metrics::CACHE_HITS.inc();
    }

    pub fn record_miss(&self) {
        metrics::CACHE_MISSES.inc();
    }

    /// Replaces the entry for `key` via temp file + rename; readers never see a partial file.
    pub async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        if !is_valid_key(key) {
            metrics::CACHE_WRITE_FAILURES.inc();
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        let encoded = serde_json::to_vec(entry)?;
        let temp = self
            .root
            .join(format!("{key}.{:016x}.{TEMP_EXT}", fastrand::u64(..)));
        let dest = self.entry_path(key);

        let result = write_then_rename(&temp, &dest, &encoded).await;
        if result.is_err() {
            metrics::CACHE_WRITE_FAILURES.inc();
            if let Err(err) = fs::remove_file(&temp).await {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %temp.display(), error = %err, "failed to remove temp file");
                }
            }
        }
        result
    }

    /// Deletes entry and temp files whose mtime is older than `retention`.
    pub async fn sweep(&self, retention: Duration) -> Result<usize, CacheError> {
        let root = self.root.as_path();
        let now = SystemTime::now();
        let mut dir = fs::read_dir(root).await.map_err(CacheError::io(root))?;
        let mut removed = 0usize;

        while let Some(item) = dir.next_entry().await.map_err(CacheError::io(root))? {
            let path = item.path();
            let ours = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == ENTRY_EXT || ext == TEMP_EXT)
                .unwrap_or(false);
            if !ours {
                continue;
            }
            let modified = match item.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable cache file");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= retention {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to evict cache file");
                }
            }
        }

        metrics::CACHE_SWEPT.inc_by(removed as u64);
        Ok(removed)
    }

    /// Runs [`Self::sweep`] every `interval` on a detached task.
    pub fn spawn_sweeper(&self, interval: Duration, retention: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match cache.sweep(retention).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "evicted expired cache files"),
                    Err(err) => warn!(error = %err, "cache sweep failed"),
                }
            }
        })
    }
}

async fn write_then_rename(temp: &Path, dest: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut file = fs::File::create(temp)
        .await
        .map_err(CacheError::io(temp))?;
    file.write_all(bytes).await.map_err(CacheError::io(temp))?;
    file.sync_all().await.map_err(CacheError::io(temp))?;
    drop(file);
    fs::rename(temp, dest).await.map_err(CacheError::io(dest))
}

mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD as BASE64_ENGINE, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_ENGINE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_ENGINE
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_validation_is_strict() {
        let key = cache_key(&["read", "repos/o/r/pulls/1"]);
        assert!(is_valid_key(&key));
        assert!(!is_valid_key(&key.to_uppercase()));
        assert!(!is_valid_key(&key[..63]));
        assert!(!is_valid_key("../../etc/passwd"));
        let mut bogus = key.clone();
        bogus.replace_range(0..1, "g");
        assert!(!is_valid_key(&bogus));
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let reference = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let at = CacheEntry::new(b"x".to_vec(), reference);
        let before = CacheEntry::new(b"x".to_vec(), reference - chrono::Duration::seconds(1));
        assert!(at.is_fresh_for(reference));
        assert!(!before.is_fresh_for(reference));
    }

    #[test]
    fn payload_is_base64_on_disk() {
        let entry = CacheEntry::new(vec![0, 159, 146, 150], Utc::now());
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["payload"], "AJ+Slg==");
        let decoded: CacheEntry = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, entry);
    }
}
