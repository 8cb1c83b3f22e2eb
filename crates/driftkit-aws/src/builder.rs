//! Builder for the AWS adapter.

use crate::AwsAdapter;
use driftkit_spi::{DriftError, DriftResult, ProviderClient};
use std::sync::Arc;

/// Default regions scanned when none are configured.
const DEFAULT_REGIONS: &[&str] = &["us-east-1", "us-west-2", "eu-west-1"];

/// Builder for [`AwsAdapter`].
#[derive(Default)]
pub struct AwsBuilder {
    client: Option<Arc<dyn ProviderClient>>,
    regions: Vec<String>,
    account_id: Option<String>,
}

impl AwsBuilder {
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

    /// Scope discovery to one account.
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Build the adapter.
    pub fn build(self) -> DriftResult<AwsAdapter> {
        let client = self.client.ok_or_else(|| {
            DriftError::Validation("AWS adapter requires an SDK shim client".to_string())
        })?;
        let regions = if self.regions.is_empty() {
            DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()
        } else {
            self.regions
        };
        Ok(AwsAdapter::from_parts(client, regions, self.account_id))
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
        assert!(AwsBuilder::new().build().is_err());
    }

    #[test]
    fn test_default_regions_applied() {
        let adapter = AwsBuilder::new().client(Arc::new(NullClient)).build().unwrap();
        assert_eq!(adapter.supported_regions().len(), DEFAULT_REGIONS.len());
    }

    #[test]
    fn test_explicit_regions_win() {
        let adapter = AwsBuilder::new()
            .client(Arc::new(NullClient))
            .region("ap-southeast-2")
            .account_id("123456789012")
            .build()
            .unwrap();
        assert_eq!(adapter.supported_regions(), vec!["ap-southeast-2"]);
        assert_eq!(adapter.account_id(), Some("123456789012"));
    }
}
