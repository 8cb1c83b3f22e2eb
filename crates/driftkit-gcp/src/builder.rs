//! Builder for the GCP adapter.

use crate::GcpAdapter;
use driftkit_spi::{DriftError, DriftResult, ProviderClient};
use std::sync::Arc;

/// Builder for [`GcpAdapter`].
#[derive(Default)]
pub struct GcpBuilder {
    client: Option<Arc<dyn ProviderClient>>,
    regions: Vec<String>,
    project: Option<String>,
}

impl GcpBuilder {
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

    /// Scope discovery to one project.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Build the adapter.
    pub fn build(self) -> DriftResult<GcpAdapter> {
        let client = self.client.ok_or_else(|| {
            DriftError::Validation("GCP adapter requires an SDK shim client".to_string())
        })?;
        let regions = if self.regions.is_empty() {
            vec!["us-central1".to_string(), "europe-west1".to_string()]
        } else {
            self.regions
        };
        Ok(GcpAdapter::from_parts(client, regions, self.project))
    }
}
