//! # DriftKit Azure Provider
//!
//! Azure implementation of the DriftKit discovery adapter.
//!
//! Normalizes ARM resource types (`Microsoft.Compute/virtualMachines`)
//! to the unified taxonomy and classifies ARM error codes into the
//! standard kinds. Requires `AZURE_SUBSCRIPTION_ID`; without it,
//! credential validation fails with an authentication error and the
//! caller may elect to proceed without Azure.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftkit_azure::AzureBuilder;
//!
//! let azure = AzureBuilder::new()
//!     .client(shim)
//!     .region("eastus")
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

/// Environment variable carrying the subscription to scan.
pub const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Native-to-unified type table for Azure.
pub const AZURE_TYPE_TABLE: &[(&str, &str)] = &[
    ("Microsoft.Compute/virtualMachines", "azure_virtual_machine"),
    ("Microsoft.Compute/disks", "azure_managed_disk"),
    ("Microsoft.Storage/storageAccounts", "azure_storage_account"),
    ("Microsoft.Network/virtualNetworks", "azure_virtual_network"),
    ("Microsoft.Network/networkSecurityGroups", "azure_network_security_group"),
    ("Microsoft.Network/publicIPAddresses", "azure_public_ip"),
    ("Microsoft.Network/loadBalancers", "azure_lb"),
    ("Microsoft.Sql/servers", "azure_sql_server"),
    ("Microsoft.Sql/servers/databases", "azure_sql_database"),
    ("Microsoft.Web/sites", "azure_app_service"),
    ("Microsoft.KeyVault/vaults", "azure_key_vault"),
    ("Microsoft.ContainerService/managedClusters", "azure_kubernetes_cluster"),
];

/// Classify an ARM error code into a standard kind.
pub fn classify_error(code: &str, message: &str) -> DriftError {
    match code {
        "TooManyRequests" | "429" => DriftError::RateLimited { retry_after: None },
        "AuthorizationFailed" | "Forbidden" => {
            DriftError::Permission(format!("{}: {}", code, message))
        }
        "InvalidAuthenticationToken" | "AuthenticationFailed" | "ExpiredAuthenticationToken"
        | "SubscriptionNotFound" => DriftError::Authentication {
            provider: "azure".to_string(),
            message: format!("{}: {}", code, message),
        },
        "GatewayTimeout" | "RequestTimeout" => DriftError::Timeout {
            operation: message.to_string(),
            duration: std::time::Duration::from_secs(30),
        },
        "ResourceNotFound" | "NotFound" | "ResourceGroupNotFound" => DriftError::NotFound {
            resource_type: "resource".to_string(),
            resource_id: message.to_string(),
        },
        _ => DriftError::Internal(format!("{}: {}", code, message)),
    }
}

/// Service segment of an ARM type: `Microsoft.Compute/...` → `compute`.
fn service_of(native_type: &str) -> &str {
    native_type
        .split('/')
        .next()
        .and_then(|ns| ns.split('.').nth(1))
        .unwrap_or("resources")
}

/// Azure discovery adapter over an injected SDK shim.
pub struct AzureAdapter {
    client: Arc<dyn ProviderClient>,
    regions: Vec<String>,
    subscription_id: Option<String>,
    mapping: TypeMapping,
}

impl AzureAdapter {
    pub(crate) fn from_parts(
        client: Arc<dyn ProviderClient>,
        regions: Vec<String>,
        subscription_id: Option<String>,
    ) -> Self {
        Self {
            client,
            regions,
            subscription_id,
            mapping: TypeMapping::new(Provider::Azure, AZURE_TYPE_TABLE),
        }
    }

    /// The subscription this adapter is scoped to, if resolved.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    fn normalize(&self, raw: RawResource) -> Resource {
        let service = service_of(&raw.native_type).to_string();
        let mut metadata = raw.metadata;
        metadata.insert(
            "native_type".to_string(),
            serde_json::Value::String(raw.native_type.clone()),
        );
        metadata.insert("service".to_string(), serde_json::Value::String(service));
        if let Some(sub) = &self.subscription_id {
            metadata.insert(
                "subscription_id".to_string(),
                serde_json::Value::String(sub.clone()),
            );
        }
        if let Some(etag) = raw.etag {
            metadata.insert(ETAG_METADATA_KEY.to_string(), serde_json::Value::String(etag));
        }

        Resource {
            id: raw.id,
            name: raw.name,
            resource_type: self.mapping.normalize(&raw.native_type),
            provider: Provider::Azure,
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
impl ProviderAdapter for AzureAdapter {
    fn name(&self) -> Provider {
        Provider::Azure
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
                Err(err) => return Err(err.with_context("azure", region, "resources")),
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
            .map_err(|e| e.with_context("azure", "global", "resources"))?;
        Ok(self.normalize(raw))
    }

    async fn tag_resource(&self, id: &str, tags: BTreeMap<String, String>) -> DriftResult<()> {
        self.client
            .apply_tags(id, &tags)
            .await
            .map_err(|e| e.with_context("azure", "global", "tags"))
    }

    async fn validate_credentials(&self) -> DriftResult<()> {
        if self.subscription_id.is_none() {
            return Err(DriftError::Authentication {
                provider: "azure".to_string(),
                message: format!("{} is not set", SUBSCRIPTION_ENV),
            }
            .with_context("azure", "global", "auth"));
        }
        self.client
            .check_credentials()
            .await
            .map_err(|e| e.with_context("azure", "global", "auth"))
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

    fn raw_vm() -> RawResource {
        RawResource {
            id: "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1".into(),
            name: "vm-1".into(),
            native_type: "Microsoft.Compute/virtualMachines".into(),
            region: "eastus".into(),
            tags: BTreeMap::new(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            etag: Some("W/\"etag-1\"".into()),
        }
    }

    #[tokio::test]
    async fn test_discover_normalizes_arm_types() {
        let adapter = AzureAdapter::from_parts(
            Arc::new(StubClient {
                resources: vec![raw_vm()],
            }),
            vec!["eastus".into()],
            Some("s1".into()),
        );

        let resources = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap();

        assert_eq!(resources[0].resource_type, "azure_virtual_machine");
        assert_eq!(resources[0].metadata["service"], "compute");
        assert_eq!(resources[0].metadata[ETAG_METADATA_KEY], "W/\"etag-1\"");
    }

    #[tokio::test]
    async fn test_missing_subscription_is_an_auth_error() {
        let adapter = AzureAdapter::from_parts(
            Arc::new(StubClient { resources: vec![] }),
            vec!["eastus".into()],
            None,
        );

        let err = adapter.validate_credentials().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        // Discovery refuses up front as well
        let err = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_classify_arm_codes() {
        assert_eq!(
            classify_error("TooManyRequests", "slow down").kind(),
            ErrorKind::RateLimit
        );
        assert_eq!(
            classify_error("AuthorizationFailed", "rbac").kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            classify_error("SubscriptionNotFound", "s1").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            classify_error("ResourceNotFound", "vm-1").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_service_of() {
        assert_eq!(service_of("Microsoft.Compute/virtualMachines"), "compute");
        assert_eq!(service_of("Microsoft.Network/loadBalancers"), "network");
        assert_eq!(service_of("malformed"), "resources");
    }
}
