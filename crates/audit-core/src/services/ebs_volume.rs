//! EBS volume auditor.
//!
//! Canonical finding: `UNATTACHED_EBS` (HIGH, state == available and no
//! attachments, savings = `size_gb * 3.00`/mo).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

pub struct EbsVolumeAuditor;

#[async_trait]
impl ServiceAuditor for EbsVolumeAuditor {
    fn name(&self) -> &'static str {
        "ebs_volume"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let volumes = match with_retry(ctx.retry_budget, || client.describe_volumes()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut unattached = 0u64;
        for vol in &volumes {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if vol.state == "available" && !vol.attached {
                unattached += 1;
                store.add(Finding {
                    kind: ResourceKind::EbsVolume,
                    resource_id: vol.id.clone(),
                    region: String::new(),
                    finding_code: "UNATTACHED_EBS".into(),
                    severity: Severity::High,
                    description: format!("volume {} ({} GiB) is unattached", vol.id, vol.size_gb),
                    recommendation: "snapshot and delete if no longer needed".into(),
                    estimated_monthly_savings: vol.size_gb * 3.00,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", volumes.len() as u64)
            .with_count("unattached", unattached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{EbsVolumeDesc, FakeCloudClient};
    use chrono::Utc;

    #[tokio::test]
    async fn test_unattached_volume_savings_is_size_times_3() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.volumes.push(EbsVolumeDesc {
            id: "vol-1".into(),
            size_gb: 50.0,
            state: "available".into(),
            attached: false,
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        EbsVolumeAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_code, "UNATTACHED_EBS");
        assert_eq!(findings[0].estimated_monthly_savings, 150.00);
    }

    #[tokio::test]
    async fn test_attached_volume_emits_nothing() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.volumes.push(EbsVolumeDesc {
            id: "vol-2".into(),
            size_gb: 20.0,
            state: "in-use".into(),
            attached: true,
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        EbsVolumeAuditor.audit(&ctx, &client, &store).await;
        assert!(store.is_empty());
    }
}
