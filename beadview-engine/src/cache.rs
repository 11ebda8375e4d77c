//! Result caching: an in-memory LRU keyed by `(fingerprint, scope)` and an
//! optional content-addressed disk layer.
//!
//! Disk blobs are a 4-byte little-endian schema version followed by the JSON
//! payload; a version mismatch is treated as a miss, never an error. Hit and
//! miss counters are kept with atomics so concurrent readers never contend.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Bumped whenever a result shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Default LRU capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

type Key = (String, String);

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Inner {
    map: FxHashMap<Key, Arc<Value>>,
    /// Keys in recency order, least recent first.
    order: VecDeque<Key>,
}

/// LRU cache of serialized results, guarded by a reader/writer lock.
pub struct ResultCache {
    capacity: usize,
    inner: RwLock<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, fingerprint: &str, scope: &str) -> Option<Arc<Value>> {
        let key = (fingerprint.to_string(), scope.to_string());
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.map.get(&key).cloned() {
            Some(value) => {
                // Bump recency.
                inner.order.retain(|k| k != &key);
                inner.order.push_back(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, fingerprint: &str, scope: &str, value: Value) {
        let key = (fingerprint.to_string(), scope.to_string());
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.map.insert(key.clone(), Arc::new(value)).is_none() {
            inner.order.push_back(key);
        } else {
            inner.order.retain(|k| k != &key);
            inner.order.push_back(key);
        }
        while inner.map.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
                debug!(fingerprint = %evicted.0, scope = %evicted.1, "evicted cached result");
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Content-addressed on-disk result cache.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, fingerprint: &str, scope: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update(b"|");
        hasher.update(scope.as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(64);
        for byte in digest {
            name.push_str(&format!("{byte:02x}"));
        }
        self.dir.join(format!("{name}.bin"))
    }

    /// Write a result blob atomically (temp file + rename).
    pub fn store(&self, fingerprint: &str, scope: &str, value: &Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;
        let path = self.path_for(fingerprint, scope);
        let mut blob = SCHEMA_VERSION.to_le_bytes().to_vec();
        blob.extend_from_slice(&serde_json::to_vec(value)?);

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &blob)
            .with_context(|| format!("writing cache blob {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("publishing cache blob {}", path.display()))?;
        Ok(())
    }

    /// Load a result blob. Any problem (missing file, short blob, version
    /// mismatch, parse failure) is a miss.
    pub fn load(&self, fingerprint: &str, scope: &str) -> Option<Value> {
        let path = self.path_for(fingerprint, scope);
        let blob = std::fs::read(&path).ok()?;
        if blob.len() < 4 {
            return None;
        }
        let version = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
        if version != SCHEMA_VERSION {
            debug!(found = version, expected = SCHEMA_VERSION, "ignoring stale cache blob");
            return None;
        }
        match serde_json::from_slice(&blob[4..]) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, path = %path.display(), "unreadable cache blob ignored");
                None
            }
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
