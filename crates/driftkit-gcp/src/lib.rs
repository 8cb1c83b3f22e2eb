//! # DriftKit GCP Provider
//!
//! GCP implementation of the DriftKit discovery adapter.
//!
//! Normalizes Cloud Asset Inventory type names
//! (`compute.googleapis.com/Instance`) to the unified taxonomy and
//! classifies googleapis status codes into the standard kinds.
//! Credential resolution is native to the SDK (application default
//! credentials); the shim confirms it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftkit_gcp::GcpBuilder;
//!
//! let gcp = GcpBuilder::new()
//!     .client(shim)
//!     .project("my-project")
//!     .region("us-central1")
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

/// Native-to-unified type table for GCP.
pub const GCP_TYPE_TABLE: &[(&str, &str)] = &[
    ("compute.googleapis.com/Instance", "gcp_compute_instance"),
    ("compute.googleapis.com/Disk", "gcp_compute_disk"),
    ("compute.googleapis.com/Network", "gcp_compute_network"),
    ("compute.googleapis.com/Subnetwork", "gcp_compute_subnetwork"),
    ("compute.googleapis.com/Firewall", "gcp_compute_firewall"),
    ("storage.googleapis.com/Bucket", "gcp_storage_bucket"),
    ("sqladmin.googleapis.com/Instance", "gcp_sql_instance"),
    ("container.googleapis.com/Cluster", "gcp_container_cluster"),
    ("cloudfunctions.googleapis.com/CloudFunction", "gcp_cloud_function"),
    ("pubsub.googleapis.com/Topic", "gcp_pubsub_topic"),
    ("bigquery.googleapis.com/Dataset", "gcp_bigquery_dataset"),
    ("iam.googleapis.com/ServiceAccount", "gcp_service_account"),
];

/// Classify a googleapis status or reason into a standard kind.
pub fn classify_error(status: &str, message: &str) -> DriftError {
    match status {
        "RESOURCE_EXHAUSTED" | "rateLimitExceeded" | "userRateLimitExceeded" => {
            DriftError::RateLimited { retry_after: None }
        }
        "PERMISSION_DENIED" | "forbidden" => {
            DriftError::Permission(format!("{}: {}", status, message))
        }
        "UNAUTHENTICATED" | "authError" => DriftError::Authentication {
            provider: "gcp".to_string(),
            message: format!("{}: {}", status, message),
        },
        "DEADLINE_EXCEEDED" => DriftError::Timeout {
            operation: message.to_string(),
            duration: std::time::Duration::from_secs(30),
        },
        "NOT_FOUND" | "notFound" => DriftError::NotFound {
            resource_type: "resource".to_string(),
            resource_id: message.to_string(),
        },
        "UNAVAILABLE" => DriftError::Internal(format!("service temporarily unavailable: {}", message)),
        _ => DriftError::Internal(format!("{}: {}", status, message)),
    }
}

/// Service segment of an asset type: `compute.googleapis.com/...` → `compute`.
fn service_of(native_type: &str) -> &str {
    native_type.split('.').next().unwrap_or("asset")
}

/// GCP discovery adapter over an injected SDK shim.
pub struct GcpAdapter {
    client: Arc<dyn ProviderClient>,
    regions: Vec<String>,
    project: Option<String>,
    mapping: TypeMapping,
}

impl GcpAdapter {
    pub(crate) fn from_parts(
        client: Arc<dyn ProviderClient>,
        regions: Vec<String>,
        project: Option<String>,
    ) -> Self {
        Self {
            client,
            regions,
            project,
            mapping: TypeMapping::new(Provider::Gcp, GCP_TYPE_TABLE),
        }
    }

    /// The project this adapter is scoped to, if any.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn normalize(&self, raw: RawResource) -> Resource {
        let service = service_of(&raw.native_type).to_string();
        let mut metadata = raw.metadata;
        metadata.insert(
            "native_type".to_string(),
            serde_json::Value::String(raw.native_type.clone()),
        );
        metadata.insert("service".to_string(), serde_json::Value::String(service));
        if let Some(project) = &self.project {
            metadata.insert(
                "project".to_string(),
                serde_json::Value::String(project.clone()),
            );
        }
        if let Some(etag) = raw.etag {
            metadata.insert(ETAG_METADATA_KEY.to_string(), serde_json::Value::String(etag));
        }

        Resource {
            id: raw.id,
            name: raw.name,
            resource_type: self.mapping.normalize(&raw.native_type),
            provider: Provider::Gcp,
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
impl ProviderAdapter for GcpAdapter {
    fn name(&self) -> Provider {
        Provider::Gcp
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
                Err(err) => return Err(err.with_context("gcp", region, "asset")),
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
            .map_err(|e| e.with_context("gcp", "global", "asset"))?;
        Ok(self.normalize(raw))
    }

    async fn tag_resource(&self, id: &str, tags: BTreeMap<String, String>) -> DriftResult<()> {
        self.client
            .apply_tags(id, &tags)
            .await
            .map_err(|e| e.with_context("gcp", "global", "labels"))
    }

    async fn validate_credentials(&self) -> DriftResult<()> {
        self.client
            .check_credentials()
            .await
            .map_err(|e| e.with_context("gcp", "global", "auth"))
    }
}
