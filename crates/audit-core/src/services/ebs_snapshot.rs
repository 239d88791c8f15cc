//! EBS snapshot auditor.
//!
//! Canonical finding: `OLD_SNAPSHOT` (LOW, `start_time` older than 365 days).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};
use chrono::Duration as ChronoDuration;

pub struct EbsSnapshotAuditor;

#[async_trait]
impl ServiceAuditor for EbsSnapshotAuditor {
    fn name(&self) -> &'static str {
        "ebs_snapshot"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let snapshots =
            match with_retry(ctx.retry_budget, || client.describe_snapshots_owned()).await {
                Ok(v) => v,
                Err(e) => return ServiceSummary::with_error(e.to_string()),
            };

        let mut old = 0u64;
        for snap in &snapshots {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if ctx.now - snap.start_time > ChronoDuration::days(365) {
                old += 1;
                store.add(Finding {
                    kind: ResourceKind::EbsSnapshot,
                    resource_id: snap.id.clone(),
                    region: String::new(),
                    finding_code: "OLD_SNAPSHOT".into(),
                    severity: Severity::Low,
                    description: format!("snapshot {} is over 365 days old", snap.id),
                    recommendation: "confirm it is still required and archive or delete".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", snapshots.len() as u64)
            .with_count("old", old)
    }
}
