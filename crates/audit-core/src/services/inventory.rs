//! Inventory-only auditors.
//!
//! These cover the service families the account enumeration touches but the
//! canonical finding table has no rows for (ECS, Batch, EFS, DynamoDB,
//! ElastiCache, CloudFront, Route 53, API Gateway, KMS, CloudWatch,
//! CloudFormation, SNS, SQS, EventBridge). Each still contributes a real
//! `ServiceSummary` with a resource count, matching the way the original
//! audit reports a block per service regardless of whether that service
//! turned up anything to flag. No auditor here ever calls `store.add` —
//! doing so would introduce a finding code outside the canonical table.

use super::ServiceAuditor;
use crate::cloud::{with_retry, CloudClient, CloudResult, InventoryItem};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::ServiceSummary;
use std::future::Future;

/// Declares a zero-finding `ServiceAuditor` that enumerates one service
/// family via `$method` and reports only how many resources it found.
macro_rules! inventory_auditor {
    ($struct_name:ident, $name:literal, $method:ident) => {
        pub struct $struct_name;

        #[async_trait]
        impl ServiceAuditor for $struct_name {
            fn name(&self) -> &'static str {
                $name
            }

            async fn audit(
                &self,
                ctx: &RunContext,
                client: &dyn CloudClient,
                _store: &FindingStore,
            ) -> ServiceSummary {
                count_resources(ctx, || client.$method()).await
            }
        }
    };
}

async fn count_resources<F, Fut>(ctx: &RunContext, call: F) -> ServiceSummary
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<Vec<InventoryItem>>>,
{
    match with_retry(ctx.retry_budget, call).await {
        Ok(items) => ServiceSummary::new().with_count("total", items.len() as u64),
        Err(e) => ServiceSummary::with_error(e.to_string()),
    }
}

inventory_auditor!(EcsAuditor, "ecs", list_clusters);
inventory_auditor!(BatchAuditor, "batch", describe_job_queues);
inventory_auditor!(EfsAuditor, "efs", describe_file_systems);
inventory_auditor!(DynamodbAuditor, "dynamodb", list_tables);
inventory_auditor!(ElasticacheAuditor, "elasticache", describe_cache_clusters);
inventory_auditor!(CloudfrontAuditor, "cloudfront", list_distributions);
inventory_auditor!(Route53Auditor, "route53", list_hosted_zones);
inventory_auditor!(ApiGatewayAuditor, "api_gateway", get_rest_apis);
inventory_auditor!(KmsAuditor, "kms", list_keys);
inventory_auditor!(CloudwatchAuditor, "cloudwatch", describe_alarms);
inventory_auditor!(CloudformationAuditor, "cloudformation", list_stacks);
inventory_auditor!(SnsAuditor, "sns", list_topics);
inventory_auditor!(SqsAuditor, "sqs", list_queues);
inventory_auditor!(EventbridgeAuditor, "eventbridge", list_rules);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudError, FakeCloudClient, InventoryItem};
    use chrono::Utc;

    #[tokio::test]
    async fn test_ecs_auditor_counts_clusters_and_adds_no_findings() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.ecs_clusters.push(InventoryItem { id: "cluster-1".into() });
        client.ecs_clusters.push(InventoryItem { id: "cluster-2".into() });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        let summary = EcsAuditor.audit(&ctx, &client, &store).await;
        assert_eq!(summary.total(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sns_auditor_reports_error_on_permission_denied() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client
            .errors
            .insert("list_topics".into(), CloudError::Permission("denied".into()));
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        let summary = SnsAuditor.audit(&ctx, &client, &store).await;
        assert!(summary.error.is_some());
    }
}
