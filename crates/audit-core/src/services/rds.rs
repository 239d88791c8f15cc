//! RDS instance auditor.
//!
//! Canonical findings: `PUBLIC_RDS` (HIGH, `publicly_accessible == true`) and
//! `STOPPED_RDS` (MEDIUM, `status == stopped`).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

pub struct RdsAuditor;

#[async_trait]
impl ServiceAuditor for RdsAuditor {
    fn name(&self) -> &'static str {
        "rds"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let instances = match with_retry(ctx.retry_budget, || client.describe_db_instances()).await
        {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut public = 0u64;
        let mut stopped = 0u64;
        for db in &instances {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if db.publicly_accessible {
                public += 1;
                store.add(Finding {
                    kind: ResourceKind::RdsInstance,
                    resource_id: db.id.clone(),
                    region: String::new(),
                    finding_code: "PUBLIC_RDS".into(),
                    severity: Severity::High,
                    description: format!("database instance {} is publicly accessible", db.id),
                    recommendation: "move it behind a private subnet or security group".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
            if db.status == "stopped" {
                stopped += 1;
                store.add(Finding {
                    kind: ResourceKind::RdsInstance,
                    resource_id: db.id.clone(),
                    region: String::new(),
                    finding_code: "STOPPED_RDS".into(),
                    severity: Severity::Medium,
                    description: format!("database instance {} is stopped", db.id),
                    recommendation: "delete it if no longer needed, storage still bills".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", instances.len() as u64)
            .with_count("public", public)
            .with_count("stopped", stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FakeCloudClient, RdsInstanceDesc};
    use chrono::Utc;

    #[tokio::test]
    async fn test_public_and_stopped_rds_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.db_instances.push(RdsInstanceDesc {
            id: "db-1".into(),
            publicly_accessible: true,
            status: "available".into(),
        });
        client.db_instances.push(RdsInstanceDesc {
            id: "db-2".into(),
            publicly_accessible: false,
            status: "stopped".into(),
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        RdsAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().any(|f| f.finding_code == "PUBLIC_RDS" && f.resource_id == "db-1"));
        assert!(findings.iter().any(|f| f.finding_code == "STOPPED_RDS" && f.resource_id == "db-2"));
    }
}
