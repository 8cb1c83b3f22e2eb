//! In-memory resource cache with TTL and deferred expiry.

use chrono::Utc;
use driftkit_spi::{CachedResource, ResourceKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default entry TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Snapshot of cache counters. All counters are monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a fresh entry
    pub hits: u64,
    /// Lookups that found nothing, or an expired entry
    pub misses: u64,
    /// Successful inserts
    pub sets: u64,
    /// Explicit deletes
    pub deletes: u64,
    /// Inserts rejected by the size cap
    pub rejected: u64,
}

/// TTL+checksum store keyed by resource identity.
///
/// Many readers, occasional writers. Lookups on expired entries count as
/// misses and return nothing, but the entry itself is only removed by
/// [`ResourceCache::cleanup_expired`]. Callers always receive clones.
pub struct ResourceCache {
    entries: RwLock<HashMap<ResourceKey, CachedResource>>,
    default_ttl: Duration,
    max_size: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    rejected: AtomicU64,
}

impl ResourceCache {
    /// Create a cache with the default 30 minute TTL and no size cap.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom default TTL.
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_size: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Cap the number of entries. Inserts of new keys beyond the cap are
    /// rejected and counted; updates of existing keys always succeed.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// The default TTL applied by [`ResourceCache::put_resource`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up an entry. Expired entries count as misses.
    pub fn get(&self, key: &ResourceKey) -> Option<CachedResource> {
        let now = Utc::now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Read an entry regardless of freshness, without counting a lookup.
    ///
    /// The diff engine uses this to treat a stale entry as the previous
    /// known state; ordinary callers should use [`ResourceCache::get`].
    pub fn peek(&self, key: &ResourceKey) -> Option<CachedResource> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or replace an entry.
    ///
    /// Returns false when a new key was rejected by the size cap.
    pub fn put(&self, entry: CachedResource) -> bool {
        let key = entry.key();
        let mut entries = self.entries.write();
        if let Some(cap) = self.max_size {
            if entries.len() >= cap && !entries.contains_key(&key) {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%key, cap, "cache full, insert rejected");
                return false;
            }
        }
        entries.insert(key, entry);
        self.sets.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Wrap a resource with the default TTL and insert it.
    pub fn put_resource(&self, resource: driftkit_spi::Resource) -> bool {
        self.put(CachedResource::new(resource, self.default_ttl))
    }

    /// Remove an entry.
    pub fn delete(&self, key: &ResourceKey) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drop all entries. Counters are preserved.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of entries, including not-yet-cleaned expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All keys currently present.
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Fraction of lookups that hit, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.hits + stats.misses;
        if total == 0 {
            0.0
        } else {
            stats.hits as f64 / total as f64
        }
    }

    /// Fraction of lookups that missed, in `[0, 1]`.
    pub fn miss_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.hits + stats.misses;
        if total == 0 {
            0.0
        } else {
            stats.misses as f64 / total as f64
        }
    }

    /// Atomic snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cache cleanup removed expired entries");
        }
        removed
    }

    /// Spawn the background cleanup loop.
    ///
    /// Runs [`ResourceCache::cleanup_expired`] every `interval` until the
    /// token is cancelled.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.cleanup_expired();
                    }
                }
            }
        })
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
