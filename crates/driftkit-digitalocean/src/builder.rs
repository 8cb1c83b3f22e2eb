//! Builder for the DigitalOcean adapter.

use crate::{DigitalOceanAdapter, TOKEN_ENV};
use driftkit_spi::{DriftError, DriftResult, ProviderClient};
use std::sync::Arc;

/// Builder for [`DigitalOceanAdapter`].
///
/// Token presence is taken from an explicit builder call or from
/// `DIGITALOCEAN_TOKEN`. Building succeeds without one so embedders can
/// register the adapter and surface the credential failure at startup
/// validation instead.
#[derive(Default)]
pub struct DigitalOceanBuilder {
    client: Option<Arc<dyn ProviderClient>>,
    regions: Vec<String>,
    token: Option<String>,
}

impl DigitalOceanBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SDK shim to delegate calls to.
    pub fn client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Add a region to scan.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    /// Set the API token explicitly instead of reading the environment.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build the adapter.
    pub fn build(self) -> DriftResult<DigitalOceanAdapter> {
        let client = self.client.ok_or_else(|| {
            DriftError::Validation("DigitalOcean adapter requires an SDK shim client".to_string())
        })?;
        let token_present = self
            .token
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .map(|t| !t.is_empty())
            .unwrap_or(false);
        let regions = if self.regions.is_empty() {
            vec!["nyc3".to_string(), "sfo3".to_string(), "ams3".to_string()]
        } else {
            self.regions
        };
        Ok(DigitalOceanAdapter::from_parts(client, regions, token_present))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use driftkit_spi::{DiscoveryFilter, ProviderAdapter, RawResource};
    use std::collections::BTreeMap;

    struct NullClient;

    #[async_trait]
    impl ProviderClient for NullClient {
        async fn list_resources(
            &self,
            _region: &str,
            _filter: &DiscoveryFilter,
        ) -> DriftResult<Vec<RawResource>> {
            Ok(Vec::new())
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

    #[test]
    fn test_build_requires_client() {
        assert!(DigitalOceanBuilder::new().build().is_err());
    }

    #[test]
    fn test_default_regions_applied() {
        let adapter = DigitalOceanBuilder::new()
            .client(Arc::new(NullClient))
            .token("dop_v1_abc")
            .build()
            .unwrap();
        assert!(adapter.supported_regions().contains(&"nyc3".to_string()));
    }

    #[tokio::test]
    async fn test_explicit_token_validates() {
        let adapter = DigitalOceanBuilder::new()
            .client(Arc::new(NullClient))
            .region("fra1")
            .token("dop_v1_abc")
            .build()
            .unwrap();
        assert_eq!(adapter.supported_regions(), vec!["fra1"]);
        assert!(adapter.validate_credentials().await.is_ok());
    }
}
