//! Security group auditor.
//!
//! Canonical finding: `OVERLY_PERMISSIVE_SG` (HIGH, an ingress rule opens
//! `0.0.0.0/0` to one of the sensitive ports `{22, 3389, 1433, 3306, 5432,
//! 1521}`).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

const SENSITIVE_PORTS: [u16; 6] = [22, 3389, 1433, 3306, 5432, 1521];

pub struct SecurityGroupAuditor;

#[async_trait]
impl ServiceAuditor for SecurityGroupAuditor {
    fn name(&self) -> &'static str {
        "security_group"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let groups =
            match with_retry(ctx.retry_budget, || client.describe_security_groups()).await {
                Ok(v) => v,
                Err(e) => return ServiceSummary::with_error(e.to_string()),
            };

        let mut flagged = 0u64;
        for sg in &groups {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let opened: Vec<u16> = sg
                .ingress_rules
                .iter()
                .filter(|r| r.cidr == "0.0.0.0/0")
                .flat_map(|r| {
                    SENSITIVE_PORTS
                        .iter()
                        .copied()
                        .filter(|p| *p >= r.from_port && *p <= r.to_port)
                })
                .collect();
            if !opened.is_empty() {
                flagged += 1;
                store.add(Finding {
                    kind: ResourceKind::SecurityGroup,
                    resource_id: sg.id.clone(),
                    region: String::new(),
                    finding_code: "OVERLY_PERMISSIVE_SG".into(),
                    severity: Severity::High,
                    description: format!(
                        "security group {} exposes {:?} to 0.0.0.0/0",
                        sg.id, opened
                    ),
                    recommendation: "restrict ingress to known CIDR ranges".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", groups.len() as u64)
            .with_count("overly_permissive", flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FakeCloudClient, IngressRule, SecurityGroupDesc};
    use chrono::Utc;

    #[tokio::test]
    async fn test_open_ssh_to_world_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.security_groups.push(SecurityGroupDesc {
            id: "sg-1".into(),
            ingress_rules: vec![IngressRule {
                cidr: "0.0.0.0/0".into(),
                from_port: 22,
                to_port: 22,
            }],
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        SecurityGroupAuditor.audit(&ctx, &client, &store).await;
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn test_open_http_to_world_is_not_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.security_groups.push(SecurityGroupDesc {
            id: "sg-2".into(),
            ingress_rules: vec![IngressRule {
                cidr: "0.0.0.0/0".into(),
                from_port: 80,
                to_port: 80,
            }],
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        SecurityGroupAuditor.audit(&ctx, &client, &store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_restricted_cidr_on_sensitive_port_not_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.security_groups.push(SecurityGroupDesc {
            id: "sg-3".into(),
            ingress_rules: vec![IngressRule {
                cidr: "10.0.0.0/8".into(),
                from_port: 22,
                to_port: 22,
            }],
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        SecurityGroupAuditor.audit(&ctx, &client, &store).await;
        assert!(store.is_empty());
    }
}
