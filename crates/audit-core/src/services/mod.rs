//! Polymorphic service auditors. Each auditor owns exactly the rows of the
//! canonical finding table (see each submodule's doc comment) that belong to
//! one resource family; the orchestrator fans them out and merges their
//! [`ServiceSummary`] and [`Finding`] output.

mod ebs_snapshot;
mod ebs_volume;
mod ec2_instance;
mod elastic_ip;
mod iam;
mod inventory;
mod lambda;
mod rds;
mod s3;
mod security_group;
mod vpc;

pub use ebs_snapshot::EbsSnapshotAuditor;
pub use ebs_volume::EbsVolumeAuditor;
pub use ec2_instance::Ec2InstanceAuditor;
pub use elastic_ip::ElasticIpAuditor;
pub use iam::IamAuditor;
pub use inventory::{
    ApiGatewayAuditor, BatchAuditor, CloudformationAuditor, CloudfrontAuditor, CloudwatchAuditor,
    DynamodbAuditor, EcsAuditor, EfsAuditor, ElasticacheAuditor, EventbridgeAuditor, KmsAuditor,
    Route53Auditor, SnsAuditor, SqsAuditor,
};
pub use lambda::LambdaAuditor;
pub use rds::RdsAuditor;
pub use s3::S3Auditor;
pub use security_group::SecurityGroupAuditor;
pub use vpc::VpcAuditor;

use crate::cloud::CloudClient;
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::ServiceSummary;

/// One resource family's audit logic. Implementations must emit findings
/// only for conditions in the canonical table; an auditor that wants to
/// signal a hard failure (rather than skip individual resources) should
/// return a summary built with [`ServiceSummary::with_error`].
#[async_trait]
pub trait ServiceAuditor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary;
}

/// The full set of auditors a `RunFull`/`RunStructured` pass invokes: the ten
/// families with canonical finding rows, followed by the inventory-only
/// families the original audit also reports a summary block for (compute,
/// storage, database, networking, security, dev tools, and messaging, in
/// that order).
pub fn full_auditor_set() -> Vec<std::sync::Arc<dyn ServiceAuditor>> {
    vec![
        std::sync::Arc::new(Ec2InstanceAuditor),
        std::sync::Arc::new(EbsVolumeAuditor),
        std::sync::Arc::new(ElasticIpAuditor),
        std::sync::Arc::new(SecurityGroupAuditor),
        std::sync::Arc::new(EbsSnapshotAuditor),
        std::sync::Arc::new(LambdaAuditor),
        std::sync::Arc::new(S3Auditor),
        std::sync::Arc::new(IamAuditor),
        std::sync::Arc::new(RdsAuditor),
        std::sync::Arc::new(VpcAuditor),
        std::sync::Arc::new(EcsAuditor),
        std::sync::Arc::new(BatchAuditor),
        std::sync::Arc::new(EfsAuditor),
        std::sync::Arc::new(DynamodbAuditor),
        std::sync::Arc::new(ElasticacheAuditor),
        std::sync::Arc::new(CloudfrontAuditor),
        std::sync::Arc::new(Route53Auditor),
        std::sync::Arc::new(ApiGatewayAuditor),
        std::sync::Arc::new(KmsAuditor),
        std::sync::Arc::new(CloudwatchAuditor),
        std::sync::Arc::new(CloudformationAuditor),
        std::sync::Arc::new(SnsAuditor),
        std::sync::Arc::new(SqsAuditor),
        std::sync::Arc::new(EventbridgeAuditor),
    ]
}

/// `RunQuick` only invokes the cheapest, highest-signal auditors: compute and
/// its two closest cost-leak neighbors.
pub fn quick_auditor_set() -> Vec<std::sync::Arc<dyn ServiceAuditor>> {
    vec![
        std::sync::Arc::new(Ec2InstanceAuditor),
        std::sync::Arc::new(EbsVolumeAuditor),
        std::sync::Arc::new(ElasticIpAuditor),
    ]
}
