//! Capability interface for the cloud provider calls the canonical finding
//! table depends on, plus the categorised error taxonomy every call resolves
//! to. Auditors never touch a vendor SDK directly; they depend on
//! [`CloudClient`] so a test can swap in [`FakeCloudClient`] and an
//! operator's real deployment can swap in a provider-backed implementation
//! without either side changing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("other: {0}")]
    Other(String),
}

impl CloudError {
    /// Whether this category warrants a retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Throttled(_) | CloudError::Transient(_))
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

// ─── Resource descriptors ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Ec2InstanceDesc {
    pub id: String,
    pub state: String,
    pub launch_time: DateTime<Utc>,
    pub user_initiated_shutdown: bool,
}

#[derive(Debug, Clone)]
pub struct EbsVolumeDesc {
    pub id: String,
    pub size_gb: f64,
    pub state: String,
    pub attached: bool,
}

#[derive(Debug, Clone)]
pub struct EbsSnapshotDesc {
    pub id: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ElasticIpDesc {
    pub public_ip: String,
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngressRule {
    pub cidr: String,
    pub from_port: u16,
    pub to_port: u16,
}

#[derive(Debug, Clone)]
pub struct SecurityGroupDesc {
    pub id: String,
    pub ingress_rules: Vec<IngressRule>,
}

#[derive(Debug, Clone)]
pub struct S3BucketDesc {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LambdaFunctionDesc {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RdsInstanceDesc {
    pub id: String,
    pub publicly_accessible: bool,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct IamUserDesc {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IamAccessKeyDesc {
    pub id: String,
    pub user_name: String,
    pub create_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VpcDesc {
    pub id: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
}

/// A bare resource id for the service families the canonical finding table
/// has no rows for. These are still enumerated so `Report.services` and
/// `total_resources` reflect full account coverage, the way the original
/// audit reports a summary block for every service family it touches even
/// when a family contributes zero findings.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub id: String,
}

/// The cloud calls the canonical finding table (see the `services` module)
/// enumerates against. Every method returns a [`CloudError`] category rather
/// than a vendor-specific error so an auditor can decide, once, whether a
/// failure means "skip this resource", "skip this service", or "retry".
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn get_caller_identity(&self) -> CloudResult<CallerIdentity>;
    async fn describe_instances(&self) -> CloudResult<Vec<Ec2InstanceDesc>>;
    async fn describe_volumes(&self) -> CloudResult<Vec<EbsVolumeDesc>>;
    async fn describe_snapshots_owned(&self) -> CloudResult<Vec<EbsSnapshotDesc>>;
    async fn describe_addresses(&self) -> CloudResult<Vec<ElasticIpDesc>>;
    async fn describe_security_groups(&self) -> CloudResult<Vec<SecurityGroupDesc>>;
    async fn list_buckets(&self) -> CloudResult<Vec<S3BucketDesc>>;
    /// `Ok(())` if the bucket has default encryption configured, `Err(NotFound)`
    /// if it does not (mirrors the real API's behavior of returning a 404
    /// `ServerSideEncryptionConfigurationNotFoundError`).
    async fn get_bucket_encryption(&self, bucket: &str) -> CloudResult<()>;
    async fn get_bucket_is_public(&self, bucket: &str) -> CloudResult<bool>;
    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool>;
    async fn describe_db_instances(&self) -> CloudResult<Vec<RdsInstanceDesc>>;
    async fn list_functions(&self) -> CloudResult<Vec<LambdaFunctionDesc>>;
    async fn list_users(&self) -> CloudResult<Vec<IamUserDesc>>;
    async fn list_mfa_devices(&self, user: &str) -> CloudResult<Vec<String>>;
    async fn list_access_keys(&self, user: &str) -> CloudResult<Vec<IamAccessKeyDesc>>;
    async fn describe_vpcs(&self) -> CloudResult<Vec<VpcDesc>>;

    // Inventory-only service families: no canonical finding references
    // these, so the descriptor carries nothing beyond an id and the
    // auditor only ever reports a resource count.
    async fn list_clusters(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn describe_job_queues(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn describe_file_systems(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_tables(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn describe_cache_clusters(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_distributions(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_hosted_zones(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn get_rest_apis(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_keys(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn describe_alarms(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_stacks(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_topics(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_queues(&self) -> CloudResult<Vec<InventoryItem>>;
    async fn list_rules(&self) -> CloudResult<Vec<InventoryItem>>;
}

// ─── Retry with exponential backoff ────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub factor: f64,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            factor: 2.0,
        }
    }
}

/// Retries `f` while it returns a retryable [`CloudError`], applying
/// exponential backoff with up to 25% jitter in either direction between
/// attempts. Non-retryable errors (AUTH, PERMISSION, NOT_FOUND, OTHER) are
/// returned immediately.
pub async fn with_retry<T, F, Fut>(budget: RetryBudget, mut f: F) -> CloudResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<T>>,
{
    let mut attempt = 0u32;
    let mut backoff = budget.initial_backoff;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < budget.max_attempts => {
                let jitter = rand::thread_rng().gen_range(0.75..=1.25);
                let sleep_for = backoff.mul_f64(jitter);
                tokio::time::sleep(sleep_for).await;
                backoff = backoff.mul_f64(budget.factor);
            }
            Err(e) => return Err(e),
        }
    }
}

// ─── In-memory fake, used by tests and the `audit-tests` scenario suite ────

/// A scriptable in-memory [`CloudClient`]. Every field is public so test code
/// can seed exactly the resources a scenario needs.
#[derive(Debug, Clone, Default)]
pub struct FakeCloudClient {
    pub account_id: String,
    pub region: String,
    pub instances: Vec<Ec2InstanceDesc>,
    pub volumes: Vec<EbsVolumeDesc>,
    pub snapshots: Vec<EbsSnapshotDesc>,
    pub addresses: Vec<ElasticIpDesc>,
    pub security_groups: Vec<SecurityGroupDesc>,
    pub buckets: Vec<S3BucketDesc>,
    pub encrypted_buckets: Vec<String>,
    pub public_buckets: Vec<String>,
    pub empty_buckets: Vec<String>,
    pub db_instances: Vec<RdsInstanceDesc>,
    pub functions: Vec<LambdaFunctionDesc>,
    pub users: Vec<IamUserDesc>,
    pub mfa_devices: std::collections::HashMap<String, Vec<String>>,
    pub access_keys: std::collections::HashMap<String, Vec<IamAccessKeyDesc>>,
    pub vpcs: Vec<VpcDesc>,
    pub ecs_clusters: Vec<InventoryItem>,
    pub batch_job_queues: Vec<InventoryItem>,
    pub efs_filesystems: Vec<InventoryItem>,
    pub dynamodb_tables: Vec<InventoryItem>,
    pub elasticache_clusters: Vec<InventoryItem>,
    pub cloudfront_distributions: Vec<InventoryItem>,
    pub route53_zones: Vec<InventoryItem>,
    pub api_gateways: Vec<InventoryItem>,
    pub kms_keys: Vec<InventoryItem>,
    pub cloudwatch_alarms: Vec<InventoryItem>,
    pub cloudformation_stacks: Vec<InventoryItem>,
    pub sns_topics: Vec<InventoryItem>,
    pub sqs_queues: Vec<InventoryItem>,
    pub eventbridge_rules: Vec<InventoryItem>,
    /// Error to return for a given method name instead of the seeded data,
    /// used to exercise the THROTTLED/TRANSIENT/PERMISSION paths.
    pub errors: std::collections::HashMap<String, CloudError>,
}

impl FakeCloudClient {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    fn maybe_err(&self, method: &str) -> Option<CloudError> {
        self.errors.get(method).cloned()
    }
}

#[async_trait]
impl CloudClient for FakeCloudClient {
    async fn get_caller_identity(&self) -> CloudResult<CallerIdentity> {
        if let Some(e) = self.maybe_err("get_caller_identity") {
            return Err(e);
        }
        Ok(CallerIdentity {
            account_id: self.account_id.clone(),
            arn: format!("arn:aws:iam::{}:root", self.account_id),
        })
    }

    async fn describe_instances(&self) -> CloudResult<Vec<Ec2InstanceDesc>> {
        if let Some(e) = self.maybe_err("describe_instances") {
            return Err(e);
        }
        Ok(self.instances.clone())
    }

    async fn describe_volumes(&self) -> CloudResult<Vec<EbsVolumeDesc>> {
        if let Some(e) = self.maybe_err("describe_volumes") {
            return Err(e);
        }
        Ok(self.volumes.clone())
    }

    async fn describe_snapshots_owned(&self) -> CloudResult<Vec<EbsSnapshotDesc>> {
        if let Some(e) = self.maybe_err("describe_snapshots_owned") {
            return Err(e);
        }
        Ok(self.snapshots.clone())
    }

    async fn describe_addresses(&self) -> CloudResult<Vec<ElasticIpDesc>> {
        if let Some(e) = self.maybe_err("describe_addresses") {
            return Err(e);
        }
        Ok(self.addresses.clone())
    }

    async fn describe_security_groups(&self) -> CloudResult<Vec<SecurityGroupDesc>> {
        if let Some(e) = self.maybe_err("describe_security_groups") {
            return Err(e);
        }
        Ok(self.security_groups.clone())
    }

    async fn list_buckets(&self) -> CloudResult<Vec<S3BucketDesc>> {
        if let Some(e) = self.maybe_err("list_buckets") {
            return Err(e);
        }
        Ok(self.buckets.clone())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> CloudResult<()> {
        if let Some(e) = self.maybe_err("get_bucket_encryption") {
            return Err(e);
        }
        if self.encrypted_buckets.iter().any(|b| b == bucket) {
            Ok(())
        } else {
            Err(CloudError::NotFound(format!(
                "no encryption configuration for {bucket}"
            )))
        }
    }

    async fn get_bucket_is_public(&self, bucket: &str) -> CloudResult<bool> {
        if let Some(e) = self.maybe_err("get_bucket_is_public") {
            return Err(e);
        }
        Ok(self.public_buckets.iter().any(|b| b == bucket))
    }

    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool> {
        if let Some(e) = self.maybe_err("bucket_is_empty") {
            return Err(e);
        }
        Ok(self.empty_buckets.iter().any(|b| b == bucket))
    }

    async fn describe_db_instances(&self) -> CloudResult<Vec<RdsInstanceDesc>> {
        if let Some(e) = self.maybe_err("describe_db_instances") {
            return Err(e);
        }
        Ok(self.db_instances.clone())
    }

    async fn list_functions(&self) -> CloudResult<Vec<LambdaFunctionDesc>> {
        if let Some(e) = self.maybe_err("list_functions") {
            return Err(e);
        }
        Ok(self.functions.clone())
    }

    async fn list_users(&self) -> CloudResult<Vec<IamUserDesc>> {
        if let Some(e) = self.maybe_err("list_users") {
            return Err(e);
        }
        Ok(self.users.clone())
    }

    async fn list_mfa_devices(&self, user: &str) -> CloudResult<Vec<String>> {
        if let Some(e) = self.maybe_err("list_mfa_devices") {
            return Err(e);
        }
        Ok(self.mfa_devices.get(user).cloned().unwrap_or_default())
    }

    async fn list_access_keys(&self, user: &str) -> CloudResult<Vec<IamAccessKeyDesc>> {
        if let Some(e) = self.maybe_err("list_access_keys") {
            return Err(e);
        }
        Ok(self.access_keys.get(user).cloned().unwrap_or_default())
    }

    async fn describe_vpcs(&self) -> CloudResult<Vec<VpcDesc>> {
        if let Some(e) = self.maybe_err("describe_vpcs") {
            return Err(e);
        }
        Ok(self.vpcs.clone())
    }

    async fn list_clusters(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_clusters") {
            return Err(e);
        }
        Ok(self.ecs_clusters.clone())
    }

    async fn describe_job_queues(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("describe_job_queues") {
            return Err(e);
        }
        Ok(self.batch_job_queues.clone())
    }

    async fn describe_file_systems(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("describe_file_systems") {
            return Err(e);
        }
        Ok(self.efs_filesystems.clone())
    }

    async fn list_tables(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_tables") {
            return Err(e);
        }
        Ok(self.dynamodb_tables.clone())
    }

    async fn describe_cache_clusters(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("describe_cache_clusters") {
            return Err(e);
        }
        Ok(self.elasticache_clusters.clone())
    }

    async fn list_distributions(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_distributions") {
            return Err(e);
        }
        Ok(self.cloudfront_distributions.clone())
    }

    async fn list_hosted_zones(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_hosted_zones") {
            return Err(e);
        }
        Ok(self.route53_zones.clone())
    }

    async fn get_rest_apis(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("get_rest_apis") {
            return Err(e);
        }
        Ok(self.api_gateways.clone())
    }

    async fn list_keys(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_keys") {
            return Err(e);
        }
        Ok(self.kms_keys.clone())
    }

    async fn describe_alarms(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("describe_alarms") {
            return Err(e);
        }
        Ok(self.cloudwatch_alarms.clone())
    }

    async fn list_stacks(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_stacks") {
            return Err(e);
        }
        Ok(self.cloudformation_stacks.clone())
    }

    async fn list_topics(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_topics") {
            return Err(e);
        }
        Ok(self.sns_topics.clone())
    }

    async fn list_queues(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_queues") {
            return Err(e);
        }
        Ok(self.sqs_queues.clone())
    }

    async fn list_rules(&self) -> CloudResult<Vec<InventoryItem>> {
        if let Some(e) = self.maybe_err("list_rules") {
            return Err(e);
        }
        Ok(self.eventbridge_rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_error_retryable() {
        assert!(CloudError::Throttled("x".into()).is_retryable());
        assert!(CloudError::Transient("x".into()).is_retryable());
        assert!(!CloudError::Auth("x".into()).is_retryable());
        assert!(!CloudError::Permission("x".into()).is_retryable());
        assert!(!CloudError::NotFound("x".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_throttle() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: CloudResult<i32> = with_retry(
            RetryBudget {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                factor: 2.0,
            },
            || async {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n < 2 {
                    Err(CloudError::Throttled("slow down".into()))
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_permission() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: CloudResult<i32> = with_retry(RetryBudget::default(), || async {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(CloudError::Permission("denied".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fake_client_bucket_encryption_not_found() {
        let mut client = FakeCloudClient::new("123", "us-east-1");
        client.buckets.push(S3BucketDesc {
            name: "my-bucket".into(),
        });
        let err = client.get_bucket_encryption("my-bucket").await.unwrap_err();
        assert!(matches!(err, CloudError::NotFound(_)));
    }
}
