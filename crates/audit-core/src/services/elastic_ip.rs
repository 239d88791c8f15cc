//! Elastic IP auditor.
//!
//! Canonical finding: `UNATTACHED_EIP` (HIGH, $3.60/mo, no `instance_id` and
//! no `network_interface_id`).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

pub struct ElasticIpAuditor;

#[async_trait]
impl ServiceAuditor for ElasticIpAuditor {
    fn name(&self) -> &'static str {
        "elastic_ip"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let addresses = match with_retry(ctx.retry_budget, || client.describe_addresses()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut unattached = 0u64;
        for eip in &addresses {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if eip.instance_id.is_none() && eip.network_interface_id.is_none() {
                unattached += 1;
                store.add(Finding {
                    kind: ResourceKind::ElasticIp,
                    resource_id: eip.public_ip.clone(),
                    region: String::new(),
                    finding_code: "UNATTACHED_EIP".into(),
                    severity: Severity::High,
                    description: format!("elastic IP {} is not attached to anything", eip.public_ip),
                    recommendation: "release it".into(),
                    estimated_monthly_savings: 3.60,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", addresses.len() as u64)
            .with_count("unattached", unattached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{ElasticIpDesc, FakeCloudClient};
    use chrono::Utc;

    #[tokio::test]
    async fn test_unattached_eip_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.addresses.push(ElasticIpDesc {
            public_ip: "1.2.3.4".into(),
            instance_id: None,
            network_interface_id: None,
        });
        client.addresses.push(ElasticIpDesc {
            public_ip: "5.6.7.8".into(),
            instance_id: Some("i-1".into()),
            network_interface_id: None,
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        ElasticIpAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].estimated_monthly_savings, 3.60);
        assert_eq!(findings[0].resource_id, "1.2.3.4");
    }
}
