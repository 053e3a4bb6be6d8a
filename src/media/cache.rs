/*!
 * Resolution and measurement caches.
 *
 * Both caches are hints, never the source of truth. An expired entry, a
 * file that has disappeared, or a measured file whose modification time
 * changed reads as a miss and the caller resolves or measures again.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use log::debug;
use parking_lot::RwLock;

use crate::app_config::CacheConfig;

/// Resolved local file for a media reference
#[derive(Debug, Clone)]
struct PathEntry {
    /// Local file the reference resolved to
    local_path: PathBuf,

    /// Insertion time, for TTL expiry
    inserted_at: Instant,

    /// Last read, for LRU eviction
    last_used: Instant,
}

/// Media reference to local path cache with TTL expiry and LRU bound
pub struct PathCache {
    entries: Arc<RwLock<HashMap<String, PathEntry>>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
    ttl: Duration,
    max_entries: usize,
}

impl PathCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.path_ttl_secs), config.path_max_entries)
    }

    /// Look up a reference; stale or vanished entries are dropped and miss
    pub fn get(&self, source_ref: &str) -> Option<PathBuf> {
        let mut entries = self.entries.write();

        let fresh = entries
            .get(source_ref)
            .map(|entry| entry.inserted_at.elapsed() < self.ttl && entry.local_path.exists());

        let usable = match fresh {
            Some(true) => entries.get_mut(source_ref).map(|entry| {
                entry.last_used = Instant::now();
                entry.local_path.clone()
            }),
            Some(false) => {
                debug!("Path cache entry for '{}' is stale, dropping", source_ref);
                entries.remove(source_ref);
                None
            }
            None => None,
        };

        match usable {
            Some(path) => {
                *self.hits.write() += 1;
                debug!("Path cache hit for '{}'", source_ref);
                Some(path)
            }
            None => {
                *self.misses.write() += 1;
                debug!("Path cache miss for '{}'", source_ref);
                None
            }
        }
    }

    /// Store a resolution, evicting the least recently used entry when full
    pub fn insert(&self, source_ref: &str, local_path: &Path) {
        let mut entries = self.entries.write();

        if !entries.contains_key(source_ref) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                debug!("Path cache full, evicting '{}'", key);
                entries.remove(&key);
            }
        }

        let now = Instant::now();
        entries.insert(
            source_ref.to_string(),
            PathEntry {
                local_path: local_path.to_path_buf(),
                inserted_at: now,
                last_used: now,
            },
        );
    }

    /// Hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        stats(*self.hits.read(), *self.misses.read())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;
        debug!("Path cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl Clone for PathCache {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            ttl: self.ttl,
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DurationEntry {
    seconds: f64,
    inserted_at: Instant,

    /// Modification time of the file when it was measured
    modified: Option<SystemTime>,
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Measured media durations, keyed by path and invalidated by TTL or any
/// change to the file on disk
pub struct DurationCache {
    entries: Arc<RwLock<HashMap<PathBuf, DurationEntry>>>,
    hits: Arc<RwLock<usize>>,
    misses: Arc<RwLock<usize>>,
    ttl: Duration,
}

impl DurationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.duration_ttl_secs))
    }

    /// Look up a measurement; expired entries and files that were removed
    /// or rewritten since measuring miss
    pub fn get(&self, path: &Path) -> Option<f64> {
        let cached = {
            let entries = self.entries.read();
            entries
                .get(path)
                .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
                .filter(|entry| entry.modified.is_some() && entry.modified == modified_at(path))
                .map(|entry| entry.seconds)
        };

        match cached {
            Some(seconds) => {
                *self.hits.write() += 1;
                debug!("Duration cache hit for {}: {:.3}s", path.display(), seconds);
                Some(seconds)
            }
            None => {
                *self.misses.write() += 1;
                self.entries.write().remove(path);
                debug!("Duration cache miss for {}", path.display());
                None
            }
        }
    }

    pub fn insert(&self, path: &Path, seconds: f64) {
        self.entries.write().insert(
            path.to_path_buf(),
            DurationEntry {
                seconds,
                inserted_at: Instant::now(),
                modified: modified_at(path),
            },
        );
    }

    pub fn stats(&self) -> (usize, usize, f64) {
        stats(*self.hits.read(), *self.misses.read())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;
        debug!("Duration cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for DurationCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl Clone for DurationCache {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            ttl: self.ttl,
        }
    }
}

fn stats(hits: usize, misses: usize) -> (usize, usize, f64) {
    let total = hits + misses;
    let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
    (hits, misses, hit_rate)
}
