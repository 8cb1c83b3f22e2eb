//! # DriftKit AWS Provider
//!
//! AWS implementation of the DriftKit discovery adapter.
//!
//! The adapter normalizes CloudFormation-style native type names
//! (`AWS::EC2::Instance`) to the unified taxonomy, classifies SDK error
//! codes into the standard kinds, and tags every error with
//! `(provider, region, service)`. The actual list/describe calls are
//! delegated to an injected [`ProviderClient`] shim.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftkit_aws::AwsBuilder;
//!
//! let aws = AwsBuilder::new()
//!     .client(shim)
//!     .region("us-east-1")
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

/// Native-to-unified type table for AWS.
pub const AWS_TYPE_TABLE: &[(&str, &str)] = &[
    ("AWS::EC2::Instance", "aws_instance"),
    ("AWS::EC2::Volume", "aws_ebs_volume"),
    ("AWS::EC2::SecurityGroup", "aws_security_group"),
    ("AWS::EC2::VPC", "aws_vpc"),
    ("AWS::EC2::Subnet", "aws_subnet"),
    ("AWS::S3::Bucket", "aws_s3_bucket"),
    ("AWS::RDS::DBInstance", "aws_db_instance"),
    ("AWS::DynamoDB::Table", "aws_dynamodb_table"),
    ("AWS::Lambda::Function", "aws_lambda_function"),
    ("AWS::IAM::Role", "aws_iam_role"),
    ("AWS::ElasticLoadBalancingV2::LoadBalancer", "aws_lb"),
    ("AWS::SQS::Queue", "aws_sqs_queue"),
    ("AWS::SNS::Topic", "aws_sns_topic"),
    ("AWS::KMS::Key", "aws_kms_key"),
];

/// Classify an AWS SDK error code into a standard kind.
///
/// Shim implementations use this to turn raw SDK failures into
/// [`DriftError`] values before handing them to the adapter.
pub fn classify_error(code: &str, message: &str) -> DriftError {
    match code {
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "TooManyRequestsException" => {
            DriftError::RateLimited { retry_after: None }
        }
        "UnauthorizedOperation" | "AccessDenied" | "AccessDeniedException" => {
            DriftError::Permission(format!("{}: {}", code, message))
        }
        "AuthFailure" | "InvalidClientTokenId" | "ExpiredToken" | "UnrecognizedClientException" => {
            DriftError::Authentication {
                provider: "aws".to_string(),
                message: format!("{}: {}", code, message),
            }
        }
        "RequestTimeout" | "RequestTimeoutException" => DriftError::Timeout {
            operation: message.to_string(),
            duration: std::time::Duration::from_secs(30),
        },
        code if code.ends_with(".NotFound") || code == "ResourceNotFoundException" => {
            DriftError::NotFound {
                resource_type: "resource".to_string(),
                resource_id: message.to_string(),
            }
        }
        _ => DriftError::Internal(format!("{}: {}", code, message)),
    }
}

/// AWS discovery adapter over an injected SDK shim.
pub struct AwsAdapter {
    client: Arc<dyn ProviderClient>,
    regions: Vec<String>,
    account_id: Option<String>,
    mapping: TypeMapping,
}

impl AwsAdapter {
    pub(crate) fn from_parts(
        client: Arc<dyn ProviderClient>,
        regions: Vec<String>,
        account_id: Option<String>,
    ) -> Self {
        Self {
            client,
            regions,
            account_id,
            mapping: TypeMapping::new(Provider::Aws, AWS_TYPE_TABLE),
        }
    }

    /// The account this adapter is scoped to, if any.
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    fn normalize(&self, raw: RawResource) -> Resource {
        let mut metadata = raw.metadata;
        metadata.insert(
            "native_type".to_string(),
            serde_json::Value::String(raw.native_type.clone()),
        );
        if let Some(account) = &self.account_id {
            metadata.insert(
                "account_id".to_string(),
                serde_json::Value::String(account.clone()),
            );
        }
        if let Some(etag) = raw.etag {
            metadata.insert(ETAG_METADATA_KEY.to_string(), serde_json::Value::String(etag));
        }

        Resource {
            id: raw.id,
            name: raw.name,
            resource_type: self.mapping.normalize(&raw.native_type),
            provider: Provider::Aws,
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
impl ProviderAdapter for AwsAdapter {
    fn name(&self) -> Provider {
        Provider::Aws
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
                // Forbidden scopes are skipped, not fatal
                Err(err) if err.kind() == ErrorKind::Permission => {
                    tracing::warn!(region, error = %err, "skipping forbidden scope");
                    continue;
                }
                Err(err) => return Err(err.with_context("aws", region, "discovery")),
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
            .map_err(|e| e.with_context("aws", "global", "describe"))?;
        Ok(self.normalize(raw))
    }

    async fn tag_resource(&self, id: &str, tags: BTreeMap<String, String>) -> DriftResult<()> {
        self.client
            .apply_tags(id, &tags)
            .await
            .map_err(|e| e.with_context("aws", "global", "tagging"))
    }

    async fn validate_credentials(&self) -> DriftResult<()> {
        // The AWS SDK resolves credentials natively; the shim confirms them
        self.client
            .check_credentials()
            .await
            .map_err(|e| e.with_context("aws", "global", "sts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct StubClient {
        resources: Vec<RawResource>,
        fail_with: Option<fn() -> DriftError>,
    }

    #[async_trait]
    impl ProviderClient for StubClient {
        async fn list_resources(
            &self,
            _region: &str,
            _filter: &DiscoveryFilter,
        ) -> DriftResult<Vec<RawResource>> {
            if let Some(make) = self.fail_with {
                return Err(make());
            }
            Ok(self.resources.clone())
        }

        async fn describe_resource(&self, id: &str) -> DriftResult<RawResource> {
            self.resources
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| DriftError::NotFound {
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

    fn raw_instance() -> RawResource {
        RawResource {
            id: "i-0abc".into(),
            name: "web-1".into(),
            native_type: "AWS::EC2::Instance".into(),
            region: "us-east-1".into(),
            tags: BTreeMap::new(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            etag: None,
        }
    }

    fn adapter(client: StubClient) -> AwsAdapter {
        AwsAdapter::from_parts(Arc::new(client), vec!["us-east-1".into()], Some("123456789012".into()))
    }

    #[tokio::test]
    async fn test_discover_normalizes_types() {
        let adapter = adapter(StubClient {
            resources: vec![raw_instance()],
            fail_with: None,
        });

        let resources = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_type, "aws_instance");
        assert_eq!(resources[0].provider, Provider::Aws);
        assert!(!resources[0].checksum.is_empty());
        assert_eq!(resources[0].metadata["account_id"], "123456789012");
    }

    #[tokio::test]
    async fn test_unknown_type_passes_through() {
        let mut raw = raw_instance();
        raw.native_type = "AWS::GroundStation::Config".into();
        let adapter = adapter(StubClient {
            resources: vec![raw],
            fail_with: None,
        });

        let resources = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap();
        assert_eq!(
            resources[0].resource_type,
            "unknown:aws:AWS::GroundStation::Config"
        );
    }

    #[tokio::test]
    async fn test_errors_are_annotated() {
        let adapter = adapter(StubClient {
            resources: vec![],
            fail_with: Some(|| DriftError::RateLimited { retry_after: None }),
        });

        let err = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.context(), Some(("aws", "us-east-1", "discovery")));
    }

    #[tokio::test]
    async fn test_permission_error_skips_scope() {
        let adapter = adapter(StubClient {
            resources: vec![],
            fail_with: Some(|| DriftError::Permission("ec2:DescribeInstances".into())),
        });

        let resources = adapter
            .discover(&CancellationToken::new(), DiscoveryFilter::all())
            .await
            .unwrap();
        assert!(resources.is_empty());
    }

    #[test]
    fn test_classify_throttling() {
        let err = classify_error("ThrottlingException", "Rate exceeded");
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_classify_auth_and_permission() {
        assert_eq!(
            classify_error("AuthFailure", "bad keys").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            classify_error("UnauthorizedOperation", "no ec2").kind(),
            ErrorKind::Permission
        );
    }

    #[test]
    fn test_classify_not_found_suffix() {
        let err = classify_error("InvalidInstanceID.NotFound", "i-0abc");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
