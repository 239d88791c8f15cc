//! Literal end-to-end scenarios the engine must satisfy exactly.

use async_trait::async_trait;
use audit_core::cloud::{
    CallerIdentity, CloudClient, CloudResult, EbsSnapshotDesc, EbsVolumeDesc, Ec2InstanceDesc,
    ElasticIpDesc, FakeCloudClient, IamAccessKeyDesc, IamUserDesc, IngressRule, InventoryItem,
    LambdaFunctionDesc, RdsInstanceDesc, S3BucketDesc, SecurityGroupDesc, VpcDesc,
};
use audit_core::context::{CancelToken, RunContext};
use audit_core::{AuditOrchestrator, FindingStore};
use audit_proto::RunMode;
use chrono::{Duration, Utc};
use std::sync::Arc;

fn ctx() -> RunContext {
    RunContext::new(Utc::now())
}

#[tokio::test]
async fn scenario_unattached_50gb_volume_costs_150_per_month() {
    let mut client = FakeCloudClient::new("123456789012", "ap-south-1");
    client.volumes.push(EbsVolumeDesc {
        id: "vol-s1".into(),
        size_gb: 50.0,
        state: "available".into(),
        attached: false,
    });
    let orchestrator = AuditOrchestrator::new(Arc::new(client));
    let report = orchestrator.run_full(&ctx()).await;

    let finding = report
        .findings
        .iter()
        .find(|f| f.finding_code == "UNATTACHED_EBS")
        .expect("expected an UNATTACHED_EBS finding");
    assert_eq!(finding.estimated_monthly_savings, 150.00);
    assert_eq!(report.summary.estimated_monthly_savings, 150.00);
}

#[tokio::test]
async fn scenario_mixed_account_produces_one_finding_per_canonical_condition() {
    let mut client = FakeCloudClient::new("123456789012", "ap-south-1");
    client.instances.push(Ec2InstanceDesc {
        id: "i-1".into(),
        state: "stopped".into(),
        launch_time: Utc::now(),
        user_initiated_shutdown: false,
    });
    client.addresses.push(ElasticIpDesc {
        public_ip: "3.3.3.3".into(),
        instance_id: None,
        network_interface_id: None,
    });
    client.security_groups.push(SecurityGroupDesc {
        id: "sg-1".into(),
        ingress_rules: vec![IngressRule {
            cidr: "0.0.0.0/0".into(),
            from_port: 3389,
            to_port: 3389,
        }],
    });
    client.snapshots.push(EbsSnapshotDesc {
        id: "snap-1".into(),
        start_time: Utc::now() - Duration::days(400),
    });
    client.functions.push(LambdaFunctionDesc {
        name: "fn-1".into(),
        last_modified: Utc::now() - Duration::days(60),
    });
    client.buckets.push(S3BucketDesc { name: "bucket-1".into() });
    client.public_buckets.push("bucket-1".into());
    client.users.push(IamUserDesc { name: "svc".into() });
    client.access_keys.insert(
        "svc".into(),
        vec![IamAccessKeyDesc {
            id: "AKIAOLD".into(),
            user_name: "svc".into(),
            create_date: Utc::now() - Duration::days(120),
        }],
    );
    client.db_instances.push(RdsInstanceDesc {
        id: "db-1".into(),
        publicly_accessible: true,
        status: "available".into(),
    });
    client.vpcs.push(VpcDesc {
        id: "vpc-default".into(),
        is_default: true,
    });

    let orchestrator = AuditOrchestrator::new(Arc::new(client));
    let report = orchestrator.run_full(&ctx()).await;

    let codes: Vec<&str> = report
        .findings
        .iter()
        .map(|f| f.finding_code.as_str())
        .collect();
    for expected in [
        "STOPPED_EC2_INSTANCE",
        "UNATTACHED_EIP",
        "OVERLY_PERMISSIVE_SG",
        "OLD_SNAPSHOT",
        "UNUSED_LAMBDA",
        "PUBLIC_S3_BUCKET",
        "UNENCRYPTED_S3_BUCKET",
        "IAM_USER_NO_MFA",
        "OLD_ACCESS_KEY",
        "PUBLIC_RDS",
        "DEFAULT_VPC_IN_USE",
    ] {
        assert!(codes.contains(&expected), "missing finding {expected}, got {codes:?}");
    }
    assert_eq!(report.metadata.mode, RunMode::Full);
}

#[tokio::test]
async fn scenario_quick_mode_excludes_iam_and_s3() {
    let client = FakeCloudClient::new("1", "ap-south-1");
    let orchestrator = AuditOrchestrator::new(Arc::new(client));
    let report = orchestrator.run_quick(&ctx()).await;

    assert_eq!(report.metadata.mode, RunMode::Quick);
    assert!(report.services.contains_key("ec2_instance"));
    assert!(report.services.contains_key("ebs_volume"));
    assert!(report.services.contains_key("elastic_ip"));
    assert!(!report.services.contains_key("iam"));
    assert!(!report.services.contains_key("s3"));
    assert!(!report.services.contains_key("rds"));
}

#[tokio::test]
async fn scenario_finding_store_caps_at_10000_and_counts_drops() {
    let store = FindingStore::new();
    for i in 0..10_010 {
        store.add(audit_proto::Finding {
            kind: audit_proto::ResourceKind::EbsVolume,
            resource_id: format!("vol-{i}"),
            region: "ap-south-1".into(),
            finding_code: "UNATTACHED_EBS".into(),
            severity: audit_proto::Severity::High,
            description: String::new(),
            recommendation: String::new(),
            estimated_monthly_savings: 3.0,
            observed_at: Utc::now(),
        });
    }
    assert_eq!(store.len(), 10_000);
    assert_eq!(store.dropped_count(), 10);
}

/// A client that cancels the run the moment its EC2 call resolves, used to
/// exercise mid-run cancellation deterministically (no sleeps or races).
struct CancellingClient {
    inner: FakeCloudClient,
    cancel: CancelToken,
}

#[async_trait]
impl CloudClient for CancellingClient {
    async fn get_caller_identity(&self) -> CloudResult<CallerIdentity> {
        self.inner.get_caller_identity().await
    }
    async fn describe_instances(&self) -> CloudResult<Vec<Ec2InstanceDesc>> {
        let result = self.inner.describe_instances().await;
        self.cancel.cancel();
        result
    }
    async fn describe_volumes(&self) -> CloudResult<Vec<EbsVolumeDesc>> {
        self.inner.describe_volumes().await
    }
    async fn describe_snapshots_owned(&self) -> CloudResult<Vec<EbsSnapshotDesc>> {
        self.inner.describe_snapshots_owned().await
    }
    async fn describe_addresses(&self) -> CloudResult<Vec<ElasticIpDesc>> {
        self.inner.describe_addresses().await
    }
    async fn describe_security_groups(&self) -> CloudResult<Vec<SecurityGroupDesc>> {
        self.inner.describe_security_groups().await
    }
    async fn list_buckets(&self) -> CloudResult<Vec<S3BucketDesc>> {
        self.inner.list_buckets().await
    }
    async fn get_bucket_encryption(&self, bucket: &str) -> CloudResult<()> {
        self.inner.get_bucket_encryption(bucket).await
    }
    async fn get_bucket_is_public(&self, bucket: &str) -> CloudResult<bool> {
        self.inner.get_bucket_is_public(bucket).await
    }
    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool> {
        self.inner.bucket_is_empty(bucket).await
    }
    async fn describe_db_instances(&self) -> CloudResult<Vec<RdsInstanceDesc>> {
        self.inner.describe_db_instances().await
    }
    async fn list_functions(&self) -> CloudResult<Vec<LambdaFunctionDesc>> {
        self.inner.list_functions().await
    }
    async fn list_users(&self) -> CloudResult<Vec<IamUserDesc>> {
        self.inner.list_users().await
    }
    async fn list_mfa_devices(&self, user: &str) -> CloudResult<Vec<String>> {
        self.inner.list_mfa_devices(user).await
    }
    async fn list_access_keys(&self, user: &str) -> CloudResult<Vec<IamAccessKeyDesc>> {
        self.inner.list_access_keys(user).await
    }
    async fn describe_vpcs(&self) -> CloudResult<Vec<VpcDesc>> {
        self.inner.describe_vpcs().await
    }
    async fn list_clusters(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_clusters().await
    }
    async fn describe_job_queues(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.describe_job_queues().await
    }
    async fn describe_file_systems(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.describe_file_systems().await
    }
    async fn list_tables(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_tables().await
    }
    async fn describe_cache_clusters(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.describe_cache_clusters().await
    }
    async fn list_distributions(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_distributions().await
    }
    async fn list_hosted_zones(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_hosted_zones().await
    }
    async fn get_rest_apis(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.get_rest_apis().await
    }
    async fn list_keys(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_keys().await
    }
    async fn describe_alarms(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.describe_alarms().await
    }
    async fn list_stacks(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_stacks().await
    }
    async fn list_topics(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_topics().await
    }
    async fn list_queues(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_queues().await
    }
    async fn list_rules(&self) -> CloudResult<Vec<InventoryItem>> {
        self.inner.list_rules().await
    }
}

#[tokio::test]
async fn scenario_cancellation_mid_run_marks_report_cancelled_with_partial_services() {
    let mut inner = FakeCloudClient::new("1", "ap-south-1");
    inner.instances.push(Ec2InstanceDesc {
        id: "i-keep".into(),
        state: "stopped".into(),
        launch_time: Utc::now(),
        user_initiated_shutdown: false,
    });
    let cancel = CancelToken::new();
    let client = CancellingClient {
        inner,
        cancel: cancel.clone(),
    };

    let orchestrator = AuditOrchestrator::with_concurrency(Arc::new(client), 1);
    let run_ctx = RunContext {
        now: Utc::now(),
        cancel,
        ..RunContext::new(Utc::now())
    };

    let report = orchestrator.run_full(&run_ctx).await;

    assert_eq!(report.metadata.mode, RunMode::Cancelled);
    assert!(report.services.contains_key("ec2_instance"));
    assert!(
        report.findings.iter().any(|f| f.finding_code == "STOPPED_EC2_INSTANCE"),
        "EC2 auditor's work that completed before cancellation should still be reported"
    );
    assert!(
        !report.services.contains_key("iam"),
        "auditors scheduled after cancellation was observed must be absent"
    );
}
