//! # DriftKit DigitalOcean Provider
//!
//! DigitalOcean implementation of the DriftKit discovery adapter.
//!
//! The DO API uses flat resource kinds (`droplet`, `volume`) and plain
//! HTTP status codes, so both the taxonomy table and the error
//! classifier are simpler than the hyperscaler adapters. Requires
//! `DIGITALOCEAN_TOKEN`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftkit_digitalocean::DigitalOceanBuilder;
//!
//! let digitalocean = DigitalOceanBuilder::new()
//!     .client(shim)
//!     .region("nyc3")
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod builder;

pub use builder::*;

use async_trait::async_trait;
use driftkit_spi::{
    DiscoveryFilter, DriftError, DriftResult, ErrorKind, Provider, ProviderAdapter,
    ProviderClient, RawResource, Resource, TypeMapping, ETAG_METADATA_KEY,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Environment variable carrying the API token.
pub const TOKEN_ENV: &str = "DIGITALOCEAN_TOKEN";

/// Native-to-unified type table for DigitalOcean.
pub const DO_TYPE_TABLE: &[(&str, &str)] = &[
    ("droplet", "digitalocean_droplet"),
    ("volume", "digitalocean_volume"),
    ("load_balancer", "digitalocean_loadbalancer"),
    ("database_cluster", "digitalocean_database_cluster"),
    ("kubernetes_cluster", "digitalocean_kubernetes_cluster"),
    ("vpc", "digitalocean_vpc"),
    ("floating_ip", "digitalocean_floating_ip"),
    ("space", "digitalocean_spaces_bucket"),
    ("domain", "digitalocean_domain"),
    ("firewall", "digitalocean_firewall"),
];

/// Classify a DO API HTTP status into a standard kind.
pub fn classify_status(status: u16, message: &str) -> DriftError {
    match status {
        429 => DriftError::RateLimited { retry_after: None },
        401 => DriftError::Authentication {
            provider: "digitalocean".to_string(),
            message: message.to_string(),
        },
        403 => DriftError::Permission(message.to_string()),
        404 => DriftError::NotFound {
            resource_type: "resource".to_string(),
            resource_id: message.to_string(),
        },
        408 | 504 => DriftError::Timeout {
            operation: message.to_string(),
            duration: std::time::Duration::from_secs(30),
        },
        _ => DriftError::Internal(format!("HTTP {}: {}", status, message)),
    }
}

/// DigitalOcean discovery adapter over an injected SDK shim.
pub struct DigitalOceanAdapter {
    client: Arc<dyn ProviderClient>,
    regions: Vec<String>,
    token_present: bool,
    mapping: TypeMapping,
}

impl DigitalOceanAdapter {
    pub(crate) fn from_parts(
        client: Arc<dyn ProviderClient>,
        regions: Vec<String>,
        token_present: bool,
    ) -> Self {
        Self {
            client,
            regions,
            token_present,
            mapping: TypeMapping::new(Provider::DigitalOcean, DO_TYPE_TABLE),
        }
    }

    fn normalize(&self, raw: RawResource) -> Resource {
        let mut metadata = raw.metadata;
        metadata.insert(
            "native_type".to_string(),
            serde_json::Value::String(raw.native_type.clone()),
        );
        if let Some(etag) = raw.etag {
            metadata.insert(ETAG_METADATA_KEY.to_string(), serde_json::Value::String(etag));
        }

        Resource {
            id: raw.id,
            name: raw.name,
            resource_type: self.mapping.normalize(&raw.native_type),
            provider: Provider::DigitalOcean,
            region: raw.region,
            tags: raw.tags,
            created_at: raw.created_at,
            metadata,
            checksum: String::new(),
        }
        .with_checksum()
    }
}

#[async_trait]
impl ProviderAdapter for DigitalOceanAdapter {
    fn name(&self) -> Provider {
        Provider::DigitalOcean
    }

    fn supported_regions(&self) -> Vec<String> {
        self.regions.clone()
    }

    fn supported_resource_types(&self) -> Vec<String> {
        self.mapping.unified_types()
    }

    async fn discover(
        &self,
        ctx: &CancellationToken,
        filter: DiscoveryFilter,
    ) -> DriftResult<Vec<Resource>> {
        self.validate_credentials().await?;

        let regions = if filter.regions.is_empty() {
            self.regions.clone()
        } else {
            filter.regions.clone()
        };

        let mut resources = Vec::new();
        for region in &regions {
            if ctx.is_cancelled() {
                return Err(DriftError::Cancelled);
            }
            let raw = match self.client.list_resources(region, &filter).await {
                Ok(raw) => raw,
                Err(err) if err.kind() == ErrorKind::Permission => {
                    tracing::warn!(region, error = %err, "skipping forbidden scope");
                    continue;
                }
                Err(err) => return Err(err.with_context("digitalocean", region, "api")),
            };
            resources.extend(
                raw.into_iter()
                    .map(|r| self.normalize(r))
                    .filter(|r| filter.matches(r)),
            );
        }
        Ok(resources)
    }

    async fn get_resource(&self, id: &str) -> DriftResult<Resource> {
        let raw = self
            .client
            .describe_resource(id)
            .await
            .map_err(|e| e.with_context("digitalocean", "global", "api"))?;
        Ok(self.normalize(raw))
    }

    async fn tag_resource(&self, id: &str, tags: BTreeMap<String, String>) -> DriftResult<()> {
        self.client
            .apply_tags(id, &tags)
            .await
            .map_err(|e| e.with_context("digitalocean", "global", "tags"))
    }

    async fn validate_credentials(&self) -> DriftResult<()> {
        if !self.token_present {
            return Err(DriftError::Authentication {
                provider: "digitalocean".to_string(),
                message: format!("{} is not set", TOKEN_ENV),
            }
            .with_context("digitalocean", "global", "auth"));
        }
        self.client
            .check_credentials()
            .await
            .map_err(|e| e.with_context("digitalocean", "global", "auth"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct StubClient {
        resources: Vec<RawResource>,
    }

    #[async_trait]
    impl ProviderClient for StubClient {
        async fn list_resources(
            &self,
            _region: &str,
            _filter: &DiscoveryFilter,
        ) -> DriftResult<Vec<RawResource>> {
            Ok(self.resources.clone())
        }

        async fn describe_resource(&self, id: &str) -> DriftResult<RawResource> {
            Err(DriftError::NotFound {
                resource_type: "resource".into(),
                resource_id: id.into(),
            })
        }

        async fn apply_tags(
            &self,
            _id: &str,
            _tags: &BTreeMap<String, String>,
        ) -> DriftResult<()> {
            Ok(())
        }

        async fn check_credentials(&self) -> DriftResult<()> {
            Ok(())
        }
    }

    fn raw_droplet() -> RawResource {
        RawResource {
            id: "362544219".into(),
            name: "web-1".into(),
            native_type: "droplet".into(),
            region: "nyc3".into(),
            tags: BTreeMap::new(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            etag: None,
        }
    }

    #[tokio::test]
    async fn test_discover_normalizes_kinds() {
        let adapter = DigitalOceanAdapter::from_parts(
            Arc::new(StubClient {
                resources: vec![raw_droplet()],
            }),
            vec!["nyc3".into()],
            true,
        );

        let resources = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap();
        assert_eq!(resources[0].resource_type, "digitalocean_droplet");
    }

    #[tokio::test]
    async fn test_missing_token_is_an_auth_error() {
        let adapter = DigitalOceanAdapter::from_parts(
            Arc::new(StubClient { resources: vec![] }),
            vec!["nyc3".into()],
            false,
        );

        let err = adapter.validate_credentials().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_classify_http_statuses() {
        assert_eq!(classify_status(429, "slow down").kind(), ErrorKind::RateLimit);
        assert_eq!(classify_status(401, "bad token").kind(), ErrorKind::Authentication);
        assert_eq!(classify_status(403, "forbidden").kind(), ErrorKind::Permission);
        assert_eq!(classify_status(404, "droplet").kind(), ErrorKind::NotFound);
        assert_eq!(classify_status(504, "gateway").kind(), ErrorKind::Timeout);
        assert_eq!(classify_status(500, "boom").kind(), ErrorKind::Internal);
    }

}
