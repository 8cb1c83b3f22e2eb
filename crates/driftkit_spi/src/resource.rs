//! Resource model shared by every discovery component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::DriftError;

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon Web Services
    Aws,
    /// Microsoft Azure
    Azure,
    /// Google Cloud Platform
    Gcp,
    /// DigitalOcean
    DigitalOcean,
}

impl Provider {
    /// All providers DriftKit knows about.
    pub const ALL: [Provider; 4] = [
        Provider::Aws,
        Provider::Azure,
        Provider::Gcp,
        Provider::DigitalOcean,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::DigitalOcean => "digitalocean",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "gcp" => Ok(Provider::Gcp),
            "digitalocean" | "do" => Ok(Provider::DigitalOcean),
            other => Err(DriftError::Validation(format!(
                "unknown provider: {}",
                other
            ))),
        }
    }
}

/// Global identity of a cloud resource: `(provider, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Owning provider
    pub provider: Provider,
    /// Provider-assigned opaque identifier
    pub id: String,
}

impl ResourceKey {
    /// Create a new key.
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// Metadata keys excluded from checksum computation because they change on
/// every observation without the resource itself changing. `etag` is
/// carried in metadata for the cache but compared separately.
pub const VOLATILE_METADATA_KEYS: &[&str] = &["last_checked", "observed_at", "request_id", "etag"];

/// Metadata key under which adapters surface a provider-supplied ETag.
pub const ETAG_METADATA_KEY: &str = "etag";

/// Immutable record of one cloud object, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-assigned opaque identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Normalized type from the unified taxonomy (e.g. `aws_instance`)
    pub resource_type: String,
    /// Owning provider
    pub provider: Provider,
    /// Region the resource lives in
    pub region: String,
    /// Resource tags
    pub tags: BTreeMap<String, String>,
    /// Creation timestamp reported by the provider
    pub created_at: DateTime<Utc>,
    /// Open provider-specific metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Deterministic checksum of the canonical record
    pub checksum: String,
}

impl Resource {
    /// Global identity of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.provider, self.id.clone())
    }

    /// Compute the checksum over the canonical form of this record.
    ///
    /// The canonical form is JSON with sorted keys covering identity,
    /// name, type, provider, region, tags, and non-volatile metadata.
    /// `created_at` and the checksum itself are excluded.
    pub fn compute_checksum(&self) -> String {
        let metadata: BTreeMap<&String, &serde_json::Value> = self
            .metadata
            .iter()
            .filter(|(k, _)| !VOLATILE_METADATA_KEYS.contains(&k.as_str()))
            .collect();

        let canonical = serde_json::json!({
            "id": self.id,
            "name": self.name,
            "type": self.resource_type,
            "provider": self.provider,
            "region": self.region,
            "tags": self.tags,
            "metadata": metadata,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Stamp the checksum field from the current canonical form.
    pub fn with_checksum(mut self) -> Self {
        self.checksum = self.compute_checksum();
        self
    }
}

/// A [`Resource`] as held by the cache, with freshness bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResource {
    /// The cached record
    pub resource: Resource,
    /// When the cache last confirmed this record against the provider
    pub last_checked: DateTime<Utc>,
    /// When the resource itself last changed, if known
    pub last_modified: Option<DateTime<Utc>>,
    /// Provider-supplied entity tag, if any
    pub etag: Option<String>,
    /// Time-to-live for this entry
    pub ttl: Duration,
}

impl CachedResource {
    /// Wrap a resource with freshness metadata.
    pub fn new(resource: Resource, ttl: Duration) -> Self {
        Self {
            resource,
            last_checked: Utc::now(),
            last_modified: None,
            etag: None,
            ttl,
        }
    }

    /// Set the provider-supplied ETag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.last_checked) <= ttl,
            Err(_) => false,
        }
    }

    /// Cache key for this entry.
    pub fn key(&self) -> ResourceKey {
        self.resource.key()
    }
}

/// Filter narrowing a discovery call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryFilter {
    /// Restrict to these regions (empty = all supported)
    pub regions: Vec<String>,
    /// Restrict to these normalized resource types (empty = all)
    pub resource_types: Vec<String>,
    /// Require these tag key/value pairs
    pub tags: BTreeMap<String, String>,
}

impl DiscoveryFilter {
    /// An unrestricted filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    /// Restrict to a resource type.
    pub fn resource_type(mut self, ty: impl Into<String>) -> Self {
        self.resource_types.push(ty.into());
        self
    }

    /// Require a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Whether a resource passes the type and tag restrictions.
    pub fn matches(&self, resource: &Resource) -> bool {
        if !self.resource_types.is_empty()
            && !self.resource_types.contains(&resource.resource_type)
        {
            return false;
        }
        self.tags
            .iter()
            .all(|(k, v)| resource.tags.get(k) == Some(v))
    }
}

/// What an SDK shim yields before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResource {
    /// Provider-assigned identifier
    pub id: String,
    /// Resource name as the provider reports it
    pub name: String,
    /// Native type name (e.g. `Microsoft.Compute/virtualMachines`)
    pub native_type: String,
    /// Region the resource was listed in
    pub region: String,
    /// Tags as the provider reports them
    pub tags: BTreeMap<String, String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Provider-specific metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Entity tag, when the provider supplies one
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Resource {
        Resource {
            id: "i-0abc".into(),
            name: "web-1".into(),
            resource_type: "aws_instance".into(),
            provider: Provider::Aws,
            region: "us-east-1".into(),
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            checksum: String::new(),
        }
        .with_checksum()
    }

    #[test]
    fn test_checksum_deterministic() {
        let a = sample();
        let mut b = a.clone();
        // created_at is excluded from the canonical form
        b.created_at = b.created_at + chrono::Duration::hours(1);
        assert_eq!(a.compute_checksum(), b.compute_checksum());
    }

    #[test]
    fn test_checksum_sensitive_to_tags() {
        let a = sample();
        let mut b = a.clone();
        b.tags.insert("env".into(), "staging".into());
        assert_ne!(a.compute_checksum(), b.compute_checksum());
    }

    #[test]
    fn test_checksum_ignores_volatile_metadata() {
        let a = sample();
        let mut b = a.clone();
        b.metadata
            .insert("observed_at".into(), serde_json::json!("2026-01-01"));
        assert_eq!(a.compute_checksum(), b.compute_checksum());
    }

    #[test]
    fn test_freshness() {
        let cached = CachedResource::new(sample(), Duration::from_secs(60));
        assert!(cached.is_fresh(Utc::now()));
        assert!(!cached.is_fresh(Utc::now() + chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_key_display() {
        let key = ResourceKey::new(Provider::DigitalOcean, "droplet-1");
        assert_eq!(key.to_string(), "digitalocean:droplet-1");
    }

    #[test]
    fn test_filter_matches() {
        let filter = DiscoveryFilter::all()
            .resource_type("aws_instance")
            .tag("env", "prod");
        assert!(filter.matches(&sample()));

        let miss = DiscoveryFilter::all().tag("env", "dev");
        assert!(!miss.matches(&sample()));
    }
}
