//! Provider contracts: the SDK shim interface and the uniform adapter.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::error::DriftResult;
use crate::resource::{DiscoveryFilter, Provider, RawResource, Resource};

/// Named interface to a cloud SDK shim.
///
/// The shim owns the actual list/describe calls against one cloud; it is
/// an external collaborator and stays unaware of normalization, caching,
/// and retry. Errors it returns are plain [`crate::DriftError`] kinds,
/// untagged; the adapter adds `(provider, region, service)` context.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// List raw resources in one region, optionally narrowed by filter.
    async fn list_resources(
        &self,
        region: &str,
        filter: &DiscoveryFilter,
    ) -> DriftResult<Vec<RawResource>>;

    /// Describe a single resource by provider-assigned id.
    async fn describe_resource(&self, id: &str) -> DriftResult<RawResource>;

    /// Apply tags to a resource.
    async fn apply_tags(&self, id: &str, tags: &BTreeMap<String, String>) -> DriftResult<()>;

    /// Verify that the configured credentials can make calls.
    async fn check_credentials(&self) -> DriftResult<()>;
}

/// Uniform discovery capability set over one cloud.
///
/// This is the only polymorphic surface of the engine: new providers are
/// added by implementing this trait and registering with the
/// orchestrator. Implementations normalize native type names to the
/// unified taxonomy, compute checksums, classify errors into the
/// standard kinds, and tag each error with `(provider, region, service)`.
///
/// # Example
///
/// ```rust,ignore
/// use driftkit_spi::{DiscoveryFilter, ProviderAdapter};
///
/// async fn count<A: ProviderAdapter>(adapter: &A) -> usize {
///     let ctx = tokio_util::sync::CancellationToken::new();
///     adapter
///         .discover(&ctx, DiscoveryFilter::all().region("us-east-1"))
///         .await
///         .map(|r| r.len())
///         .unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter fronts.
    fn name(&self) -> Provider;

    /// Regions this adapter can discover in.
    fn supported_regions(&self) -> Vec<String>;

    /// Normalized resource types this adapter can produce.
    fn supported_resource_types(&self) -> Vec<String>;

    /// Discover resources matching the filter.
    ///
    /// Implementations observe `ctx` at their I/O boundary and return
    /// [`crate::DriftError::Cancelled`] when it fires.
    async fn discover(
        &self,
        ctx: &CancellationToken,
        filter: DiscoveryFilter,
    ) -> DriftResult<Vec<Resource>>;

    /// Fetch a single resource by provider-assigned id.
    async fn get_resource(&self, id: &str) -> DriftResult<Resource>;

    /// Apply tags to a resource.
    async fn tag_resource(&self, id: &str, tags: BTreeMap<String, String>) -> DriftResult<()>;

    /// Verify the adapter's credentials without discovering anything.
    async fn validate_credentials(&self) -> DriftResult<()>;
}
