//! VPC auditor.
//!
//! Canonical finding: `DEFAULT_VPC_IN_USE` (INFO, `is_default == true`).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};

pub struct VpcAuditor;

#[async_trait]
impl ServiceAuditor for VpcAuditor {
    fn name(&self) -> &'static str {
        "vpc"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let vpcs = match with_retry(ctx.retry_budget, || client.describe_vpcs()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut default_in_use = 0u64;
        for vpc in &vpcs {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if vpc.is_default {
                default_in_use += 1;
                store.add(Finding {
                    kind: ResourceKind::Vpc,
                    resource_id: vpc.id.clone(),
                    region: String::new(),
                    finding_code: "DEFAULT_VPC_IN_USE".into(),
                    severity: Severity::Info,
                    description: format!("the default VPC {} is still present", vpc.id),
                    recommendation: "migrate workloads to a purpose-built VPC".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", vpcs.len() as u64)
            .with_count("default_in_use", default_in_use)
    }
}
