//! Lambda function auditor.
//!
//! Canonical finding: `UNUSED_LAMBDA` (MEDIUM, `last_modified` older than 30
//! days, a proxy for "hasn't been deployed to recently").

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};
use chrono::Duration as ChronoDuration;

pub struct LambdaAuditor;

#[async_trait]
impl ServiceAuditor for LambdaAuditor {
    fn name(&self) -> &'static str {
        "lambda"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let functions = match with_retry(ctx.retry_budget, || client.list_functions()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut unused = 0u64;
        for f in &functions {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if ctx.now - f.last_modified > ChronoDuration::days(30) {
                unused += 1;
                store.add(Finding {
                    kind: ResourceKind::LambdaFunction,
                    resource_id: f.name.clone(),
                    region: String::new(),
                    finding_code: "UNUSED_LAMBDA".into(),
                    severity: Severity::Medium,
                    description: format!("function {} has not been updated in over 30 days", f.name),
                    recommendation: "confirm it is still invoked, or remove it".into(),
                    estimated_monthly_savings: 0.0,
                    observed_at: ctx.now,
                });
            }
        }

        ServiceSummary::new()
            .with_count("total", functions.len() as u64)
            .with_count("unused", unused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FakeCloudClient, LambdaFunctionDesc};
    use chrono::Utc;

    #[tokio::test]
    async fn test_stale_lambda_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.functions.push(LambdaFunctionDesc {
            name: "fn-a".into(),
            last_modified: Utc::now() - ChronoDuration::days(40),
        });
        client.functions.push(LambdaFunctionDesc {
            name: "fn-b".into(),
            last_modified: Utc::now() - ChronoDuration::days(2),
        });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        LambdaAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "fn-a");
    }
}
