//! Incremental discovery: diff current cloud state against the cache.

use chrono::Utc;
use driftkit_spi::{
    CachedResource, DiscoveryFilter, DriftError, DriftResult, Provider, Resource, ResourceKey,
    ETAG_METADATA_KEY,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::bloom::BloomFilter;
use crate::cache::ResourceCache;
use crate::events::{Event, EventBus, EventType};
use crate::orchestrator::DiscoveryOrchestrator;
use crate::tracker::ChangeTracker;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scan only targets with change candidates instead of everything
    pub differential_sync: bool,
    /// Consult the change-log reader for candidates
    pub use_cloud_trails: bool,
    /// Bit count for each cycle's fresh bloom filter
    pub bloom_filter_size: u64,
    /// Probe count for the bloom filter
    pub bloom_filter_hashes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            differential_sync: false,
            use_cloud_trails: false,
            bloom_filter_size: 65_536,
            bloom_filter_hashes: 4,
        }
    }
}

/// Partition of one cycle's observations. Each identity in scope appears
/// in exactly one of the four classes.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Identities seen for the first time
    pub new: Vec<ResourceKey>,
    /// Identities whose checksum or ETag changed
    pub updated: Vec<ResourceKey>,
    /// Cached identities absent from the scanned scope
    pub deleted: Vec<ResourceKey>,
    /// Identities confirmed unchanged
    pub unchanged_count: u64,
    /// Cache lookups that found a comparable entry
    pub cache_hits: u64,
    /// Cache lookups that found nothing
    pub cache_misses: u64,
    /// Re-observations of an already-seen identity, dropped
    pub duplicate_observations: u64,
    /// Per-job errors from partially failed scans
    pub errors: Vec<DriftError>,
    /// Wall time of the cycle
    pub duration: Duration,
}

impl DiscoveryResult {
    /// Total identities covered by the partition.
    pub fn total(&self) -> u64 {
        self.new.len() as u64 + self.updated.len() as u64 + self.deleted.len() as u64
            + self.unchanged_count
    }
}

/// Incrementally-refreshed discovery pipeline.
///
/// Consults the change tracker and bloom filter to skip unchanged work,
/// dispatches the orchestrator, classifies each observation against the
/// cache, and emits the cycle result onto the event bus.
pub struct IncrementalEngine {
    cache: Arc<ResourceCache>,
    tracker: Arc<ChangeTracker>,
    bloom: RwLock<Arc<BloomFilter>>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    events: Arc<EventBus>,
    config: EngineConfig,
}

impl IncrementalEngine {
    /// Wire an engine from its collaborators.
    pub fn new(
        cache: Arc<ResourceCache>,
        tracker: Arc<ChangeTracker>,
        orchestrator: Arc<DiscoveryOrchestrator>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        let bloom = Arc::new(BloomFilter::new(
            config.bloom_filter_size,
            config.bloom_filter_hashes,
        ));
        Self {
            cache,
            tracker,
            bloom: RwLock::new(bloom),
            orchestrator,
            events,
            config,
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// The shared change tracker.
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    /// Run one discovery cycle over the given providers and regions.
    pub async fn run_cycle(
        &self,
        ctx: &CancellationToken,
        providers: &[Provider],
        regions: &[String],
        filter: DiscoveryFilter,
    ) -> DriftResult<DiscoveryResult> {
        let started = Instant::now();
        self.events.publish(
            Event::new(EventType::DiscoveryStarted).with_data(serde_json::json!({
                "providers": providers.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            })),
        );

        let candidates = self.collect_candidates(providers).await?;
        let (scan_providers, scan_regions) = if self.config.differential_sync {
            self.differential_targets(providers, regions, &candidates)
        } else {
            (providers.to_vec(), regions.to_vec())
        };

        let outcome = match self
            .orchestrator
            .discover_all(ctx, &scan_providers, &scan_regions, filter)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.events.publish(
                    Event::new(EventType::DiscoveryFailed)
                        .with_data(serde_json::json!({ "error": err.to_string() })),
                );
                return Err(err);
            }
        };

        // Deletion is only decided inside scope that was actually scanned
        let scanned: HashSet<(Provider, String)> = outcome
            .jobs
            .iter()
            .filter(|j| j.status == crate::job::JobStatus::Completed)
            .map(|j| (j.provider, j.region.clone()))
            .collect();

        let next_bloom = Arc::new(BloomFilter::new(
            self.config.bloom_filter_size,
            self.config.bloom_filter_hashes,
        ));
        let mut result = DiscoveryResult {
            errors: outcome.errors,
            ..Default::default()
        };
        let mut seen: HashSet<ResourceKey> = HashSet::new();

        for resource in outcome.resources {
            let key = resource.key();
            // Multi-region global resources: first observation wins
            if !seen.insert(key.clone()) {
                result.duplicate_observations += 1;
                tracing::warn!(%key, "duplicate observation dropped");
                continue;
            }
            self.classify(resource, &key, &next_bloom, &mut result);
        }

        for key in self.cache.keys() {
            if seen.contains(&key) {
                continue;
            }
            let Some(entry) = self.cache.peek(&key) else {
                continue;
            };
            if scanned.contains(&(key.provider, entry.resource.region.clone())) {
                self.cache.delete(&key);
                self.tracker.forget(&key);
                result.deleted.push(key);
            }
        }

        for provider in &scan_providers {
            self.tracker.update_last_discovery(*provider);
        }
        // Swap in the fresh filter at the cycle boundary
        *self.bloom.write() = next_bloom;

        result.duration = started.elapsed();
        self.events.publish(
            Event::new(EventType::DiscoveryCompleted).with_data(serde_json::json!({
                "new": result.new.len(),
                "updated": result.updated.len(),
                "deleted": result.deleted.len(),
                "unchanged": result.unchanged_count,
                "duration_ms": result.duration.as_millis() as u64,
            })),
        );
        tracing::info!(
            new = result.new.len(),
            updated = result.updated.len(),
            deleted = result.deleted.len(),
            unchanged = result.unchanged_count,
            "discovery cycle finished"
        );
        Ok(result)
    }

    fn classify(
        &self,
        resource: Resource,
        key: &ResourceKey,
        next_bloom: &BloomFilter,
        result: &mut DiscoveryResult,
    ) {
        let etag = resource
            .metadata
            .get(ETAG_METADATA_KEY)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        match self.cache.peek(key) {
            None => {
                result.cache_misses += 1;
                result.new.push(key.clone());
                next_bloom.insert(&key.to_string());
                self.events.publish(
                    Event::new(EventType::ResourceFound).with_data(serde_json::json!({
                        "key": key.to_string(),
                        "type": resource.resource_type,
                        "region": resource.region,
                    })),
                );
                self.store(resource, etag);
            }
            Some(cached) => {
                // An expired entry still counts as a miss for the stats,
                // but remains the previous state for classification
                if cached.is_fresh(Utc::now()) {
                    result.cache_hits += 1;
                } else {
                    result.cache_misses += 1;
                }
                let unchanged = match (&etag, &cached.etag) {
                    // A provider-supplied ETag is authoritative
                    (Some(new_etag), Some(old_etag)) => new_etag == old_etag,
                    _ => resource.checksum == cached.resource.checksum,
                };
                if unchanged {
                    result.unchanged_count += 1;
                    // Refresh freshness without touching the record
                    let mut entry = cached;
                    entry.last_checked = Utc::now();
                    self.cache.put(entry);
                } else {
                    result.updated.push(key.clone());
                    next_bloom.insert(&key.to_string());
                    self.store(resource, etag);
                }
            }
        }
    }

    fn store(&self, resource: Resource, etag: Option<String>) {
        let key = resource.key();
        let mut entry = CachedResource::new(resource, self.cache.default_ttl());
        entry.last_modified = Some(Utc::now());
        if let Some(etag) = etag {
            self.tracker.update_etag(key, etag.clone());
            entry.etag = Some(etag);
        }
        self.cache.put(entry);
    }

    /// Candidate identities that might have changed since the last cycle.
    async fn collect_candidates(
        &self,
        providers: &[Provider],
    ) -> DriftResult<HashSet<ResourceKey>> {
        let mut candidates: HashSet<ResourceKey> = HashSet::new();

        if self.config.use_cloud_trails {
            let since = providers
                .iter()
                .filter_map(|p| self.tracker.last_discovery(*p))
                .min();
            if let Some(since) = since {
                for change in self.tracker.changes_since(since).await? {
                    candidates.insert(change.key);
                }
            }
        }

        let now = Utc::now();
        let bloom = self.bloom.read().clone();
        for key in self.cache.keys() {
            let stale = self
                .cache
                .peek(&key)
                .map(|e| !e.is_fresh(now))
                .unwrap_or(true);
            if stale || bloom.might_contain(&key.to_string()) {
                candidates.insert(key);
            }
        }
        Ok(candidates)
    }

    /// Narrow the scan to providers that contain candidates, plus
    /// providers that have never been scanned.
    ///
    /// Narrowing stops at provider granularity: [`ResourceKey`] carries
    /// no region, so a provider with one candidate still has all of its
    /// configured regions scanned. Region-level narrowing needs a
    /// region-bearing identity first.
    fn differential_targets(
        &self,
        providers: &[Provider],
        regions: &[String],
        candidates: &HashSet<ResourceKey>,
    ) -> (Vec<Provider>, Vec<String>) {
        let keep: Vec<Provider> = providers
            .iter()
            .copied()
            .filter(|p| {
                self.tracker.last_discovery(*p).is_none()
                    || candidates.iter().any(|k| k.provider == *p)
            })
            .collect();
        (keep, regions.to_vec())
    }
}
