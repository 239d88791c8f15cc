//! EC2 instance auditor.
//!
//! Canonical findings: `STOPPED_EC2_INSTANCE` (LOW, $60.00/mo, state ==
//! stopped) and `IDLE_EC2_INSTANCE` (MEDIUM, $150.00/mo, running for more
//! than 7 days with no user-initiated shutdown on record).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};
use chrono::Duration as ChronoDuration;

pub struct Ec2InstanceAuditor;

#[async_trait]
impl ServiceAuditor for Ec2InstanceAuditor {
    fn name(&self) -> &'static str {
        "ec2_instance"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let instances = match with_retry(ctx.retry_budget, || client.describe_instances()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut stopped = 0u64;
        let mut idle = 0u64;
        for inst in &instances {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if inst.state == "stopped" {
                stopped += 1;
                store.add(Finding {
                    kind: ResourceKind::Ec2Instance,
                    resource_id: inst.id.clone(),
                    region: String::new(),
                    finding_code: "STOPPED_EC2_INSTANCE".into(),
                    severity: Severity::Low,
                    description: format!("instance {} is stopped", inst.id),
                    recommendation: "terminate if no longer needed".into(),
                    estimated_monthly_savings: 60.00,
                    observed_at: ctx.now,
                });
            } else if inst.state == "running"
                && ctx.now - inst.launch_time > ChronoDuration::days(7)
                && !inst.user_initiated_shutdown
            {
                idle += 1;
                store.add(Finding {
                    kind: ResourceKind::Ec2Instance,
                    resource_id: inst.id.clone(),
                    region: String::new(),
                    finding_code: "IDLE_EC2_INSTANCE".into(),
                    severity: Severity::Medium,
                    description: format!(
                        "instance {} has been running for over 7 days with no recorded shutdown",
                        inst.id
                    ),
                    recommendation: "review utilization and right-size or schedule it".into(),
                    estimated_monthly_savings: 150.00,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", instances.len() as u64)
            .with_count("stopped", stopped)
            .with_count("idle", idle)
    }
}
