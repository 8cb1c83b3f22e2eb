//! Change tracking: last-discovery times, ETags, and change-log consumption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftkit_spi::{DriftResult, Provider, ResourceKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// What happened to a resource according to a cloud audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was deleted
    Deleted,
}

/// One change observed by a change-log reader.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    /// Which resource changed
    pub key: ResourceKey,
    /// What kind of change
    pub change_type: ChangeType,
    /// When the change happened
    pub occurred_at: DateTime<Utc>,
}

/// Consumer of a cloud audit log (CloudTrail, Activity Log, ...).
///
/// An external collaborator; the tracker delegates `changes_since` to it
/// and never fabricates changes of its own.
#[async_trait]
pub trait ChangeLogReader: Send + Sync {
    /// Changes recorded since `since`.
    async fn changes_since(&self, since: DateTime<Utc>) -> DriftResult<Vec<ResourceChange>>;
}

/// Tracks last-seen times and ETags per resource identity.
pub struct ChangeTracker {
    last_discovery: RwLock<HashMap<Provider, DateTime<Utc>>>,
    etags: RwLock<HashMap<ResourceKey, String>>,
    reader: Option<Arc<dyn ChangeLogReader>>,
}

impl ChangeTracker {
    /// Create a tracker without a change-log reader.
    pub fn new() -> Self {
        Self {
            last_discovery: RwLock::new(HashMap::new()),
            etags: RwLock::new(HashMap::new()),
            reader: None,
        }
    }

    /// Attach a change-log reader.
    pub fn with_reader(mut self, reader: Arc<dyn ChangeLogReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Stamp `now` as the last discovery time for a provider.
    pub fn update_last_discovery(&self, provider: Provider) {
        self.last_discovery.write().insert(provider, Utc::now());
    }

    /// When a provider was last discovered, if ever.
    pub fn last_discovery(&self, provider: Provider) -> Option<DateTime<Utc>> {
        self.last_discovery.read().get(&provider).copied()
    }

    /// Record the latest ETag for a resource.
    pub fn update_etag(&self, key: ResourceKey, etag: impl Into<String>) {
        self.etags.write().insert(key, etag.into());
    }

    /// Forget the ETag for a resource (e.g. after deletion).
    pub fn forget(&self, key: &ResourceKey) {
        self.etags.write().remove(key);
    }

    /// Whether the resource changed relative to the tracked ETag.
    ///
    /// An unknown id is treated as changed so the caller re-evaluates it.
    pub fn has_changed(&self, key: &ResourceKey, etag: &str) -> bool {
        match self.etags.read().get(key) {
            Some(tracked) => tracked != etag,
            None => true,
        }
    }

    /// Changes since `since`, delegated to the injected reader.
    ///
    /// With no reader configured this returns an empty list.
    pub async fn changes_since(&self, since: DateTime<Utc>) -> DriftResult<Vec<ResourceChange>> {
        match &self.reader {
            Some(reader) => reader.changes_since(since).await,
            None => Ok(Vec::new()),
        }
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubReader(Vec<ResourceChange>);

    #[async_trait]
    impl ChangeLogReader for StubReader {
        async fn changes_since(&self, _since: DateTime<Utc>) -> DriftResult<Vec<ResourceChange>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_unknown_id_counts_as_changed() {
        let tracker = ChangeTracker::new();
        let key = ResourceKey::new(Provider::Aws, "i-1");
        assert!(tracker.has_changed(&key, "etag-1"));
    }

    #[test]
    fn test_etag_tracking() {
        let tracker = ChangeTracker::new();
        let key = ResourceKey::new(Provider::Aws, "i-1");

        tracker.update_etag(key.clone(), "etag-1");
        assert!(!tracker.has_changed(&key, "etag-1"));
        assert!(tracker.has_changed(&key, "etag-2"));

        tracker.forget(&key);
        assert!(tracker.has_changed(&key, "etag-1"));
    }

    #[test]
    fn test_last_discovery_stamp() {
        let tracker = ChangeTracker::new();
        assert!(tracker.last_discovery(Provider::Gcp).is_none());
        tracker.update_last_discovery(Provider::Gcp);
        assert!(tracker.last_discovery(Provider::Gcp).is_some());
    }

    #[tokio::test]
    async fn test_changes_without_reader_is_empty() {
        let tracker = ChangeTracker::new();
        let changes = tracker.changes_since(Utc::now()).await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_changes_delegate_to_reader() {
        let change = ResourceChange {
            key: ResourceKey::new(Provider::Azure, "vm-1"),
            change_type: ChangeType::Modified,
            occurred_at: Utc::now(),
        };
        let tracker = ChangeTracker::new().with_reader(Arc::new(StubReader(vec![change])));
        let changes = tracker.changes_since(Utc::now()).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }
}
