//! S3 bucket auditor.
//!
//! Canonical findings: `PUBLIC_S3_BUCKET` (CRITICAL, bucket policy status
//! reports public), `UNENCRYPTED_S3_BUCKET` (HIGH, `GetBucketEncryption`
//! resolves NOT_FOUND), `EMPTY_S3_BUCKET` (LOW, a one-object `ListObjectsV2`
//! call returns no objects).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, CloudError, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

pub struct S3Auditor;

#[async_trait]
impl ServiceAuditor for S3Auditor {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let buckets = match with_retry(ctx.retry_budget, || client.list_buckets()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut public = 0u64;
        let mut unencrypted = 0u64;
        let mut empty = 0u64;

        for bucket in &buckets {
            if ctx.cancel.is_cancelled() {
                break;
            }

            match with_retry(ctx.retry_budget, || client.get_bucket_is_public(&bucket.name)).await
            {
                Ok(true) => {
                    public += 1;
                    store.add(Finding {
                        kind: ResourceKind::S3Bucket,
                        resource_id: bucket.name.clone(),
                        region: String::new(),
                        finding_code: "PUBLIC_S3_BUCKET".into(),
                        severity: Severity::Critical,
                        description: format!("bucket {} is publicly accessible", bucket.name),
                        recommendation: "enable block public access immediately".into(),
                        estimated_monthly_savings: 0.0,
                        observed_at: ctx.now,
                    });
                }
                Ok(false) => {}
                Err(_) => {}
            }

            match with_retry(ctx.retry_budget, || client.get_bucket_encryption(&bucket.name)).await
            {
                Ok(()) => {}
                Err(CloudError::NotFound(_)) => {
                    unencrypted += 1;
                    store.add(Finding {
                        kind: ResourceKind::S3Bucket,
                        resource_id: bucket.name.clone(),
                        region: String::new(),
                        finding_code: "UNENCRYPTED_S3_BUCKET".into(),
                        severity: Severity::High,
                        description: format!("bucket {} has no default encryption", bucket.name),
                        recommendation: "enable SSE-S3 or SSE-KMS by default".into(),
                        estimated_monthly_savings: 0.0,
                        observed_at: ctx.now,
                    });
                }
                Err(_) => {}
            }

            if let Ok(true) = with_retry(ctx.retry_budget, || client.bucket_is_empty(&bucket.name)).await
            {
                empty += 1;
                store.add(Finding {
                    kind: ResourceKind::S3Bucket,
                    resource_id: bucket.name.clone(),
                    region: String::new(),
                    finding_code: "EMPTY_S3_BUCKET".into(),
                    severity: Severity::Low,
                    description: format!("bucket {} contains no objects", bucket.name),
                    recommendation: "remove it if unused".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", buckets.len() as u64)
            .with_count("public", public)
            .with_count("unencrypted", unencrypted)
            .with_count("empty", empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FakeCloudClient, S3BucketDesc};
    use chrono::Utc;

    #[tokio::test]
    async fn test_public_bucket_flagged_critical() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.buckets.push(S3BucketDesc { name: "b1".into() });
        client.public_buckets.push("b1".into());
        client.encrypted_buckets.push("b1".into());
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        S3Auditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert!(
            findings
                .iter()
                .any(|f| f.finding_code == "PUBLIC_S3_BUCKET" && f.severity == Severity::Critical)
        );
    }

    #[tokio::test]
    async fn test_unencrypted_bucket_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.buckets.push(S3BucketDesc { name: "b2".into() });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        S3Auditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert!(findings.iter().any(|f| f.finding_code == "UNENCRYPTED_S3_BUCKET"));
    }

    #[tokio::test]
    async fn test_empty_bucket_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.buckets.push(S3BucketDesc { name: "b3".into() });
        client.encrypted_buckets.push("b3".into());
        client.empty_buckets.push("b3".into());
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        S3Auditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert!(findings.iter().any(|f| f.finding_code == "EMPTY_S3_BUCKET"));
    }

    #[tokio::test]
    async fn test_compliant_bucket_emits_nothing() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.buckets.push(S3BucketDesc { name: "b4".into() });
        client.encrypted_buckets.push("b4".into());
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        S3Auditor.audit(&ctx, &client, &store).await;
        assert!(store.is_empty());
    }
}
