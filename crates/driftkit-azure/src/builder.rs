//! Builder for the Azure adapter.

use crate::{AzureAdapter, SUBSCRIPTION_ENV};
use driftkit_spi::{DriftError, DriftResult, ProviderClient};
use std::sync::Arc;

/// Builder for [`AzureAdapter`].
///
/// The subscription is taken from an explicit builder call or from
/// `AZURE_SUBSCRIPTION_ID`. Building succeeds without one so embedders
/// can register the adapter and surface the credential failure at
/// startup validation instead.
#[derive(Default)]
pub struct AzureBuilder {
    client: Option<Arc<dyn ProviderClient>>,
    regions: Vec<String>,
    subscription_id: Option<String>,
}

impl AzureBuilder {
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

    /// Set the subscription explicitly instead of reading the environment.
    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    /// Build the adapter.
    pub fn build(self) -> DriftResult<AzureAdapter> {
        let client = self.client.ok_or_else(|| {
            DriftError::Validation("Azure adapter requires an SDK shim client".to_string())
        })?;
        let subscription_id = self
            .subscription_id
            .or_else(|| std::env::var(SUBSCRIPTION_ENV).ok().filter(|s| !s.is_empty()));
        let regions = if self.regions.is_empty() {
            vec!["eastus".to_string(), "westeurope".to_string()]
        } else {
            self.regions
        };
        Ok(AzureAdapter::from_parts(client, regions, subscription_id))
    }
}
