//! Fans the service auditors out with bounded concurrency, merges their
//! output into a [`Report`], and tolerates individual auditor failure
//! (including a panicking auditor task) without aborting the run.

use crate::cloud::CloudClient;
use crate::context::RunContext;
use crate::services::{self, ServiceAuditor};
use crate::store::FindingStore;
use audit_proto::{Recommendation, Report, ReportMetadata, ReportSummary, ResourceKind, RunMode, Severity};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Number of auditors allowed to have in-flight cloud calls at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct AuditOrchestrator {
    client: Arc<dyn CloudClient>,
    concurrency: usize,
}

impl AuditOrchestrator {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(client: Arc<dyn CloudClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run_full(&self, ctx: &RunContext) -> Report {
        self.run(ctx, services::full_auditor_set(), RunMode::Full).await
    }

    pub async fn run_structured(&self, ctx: &RunContext) -> Report {
        self.run(ctx, services::full_auditor_set(), RunMode::Structured)
            .await
    }

    pub async fn run_quick(&self, ctx: &RunContext) -> Report {
        self.run(ctx, services::quick_auditor_set(), RunMode::Quick)
            .await
    }

    async fn run(
        &self,
        ctx: &RunContext,
        auditors: Vec<Arc<dyn ServiceAuditor>>,
        requested_mode: RunMode,
    ) -> Report {
        let started_at = ctx.now;
        let account_id = match self.client.get_caller_identity().await {
            Ok(id) => id.account_id,
            Err(_) => "unknown".to_string(),
        };

        let store = Arc::new(FindingStore::new());
        let mut warnings = Vec::new();
        let services = self.run_auditors(ctx, &auditors, store.clone(), &mut warnings).await;

        let mode = if ctx.cancel.is_cancelled() {
            RunMode::Cancelled
        } else {
            requested_mode
        };

        let findings = store.all();
        let dropped = store.dropped_count();
        if dropped > 0 {
            warnings.push(format!(
                "{dropped} findings were dropped after the run reached its 10,000 finding cap"
            ));
        }

        let total_resources = services.values().map(|s| s.total()).sum();
        let critical = store.count(Severity::Critical) + store.count(Severity::High);

        let recommendations = build_recommendations(&store);

        Report {
            metadata: ReportMetadata {
                account_id,
                region: "ap-south-1".to_string(),
                started_at,
                finished_at: chrono::Utc::now(),
                mode,
            },
            services,
            summary: ReportSummary {
                total_resources,
                total_findings: findings.len() as u64,
                critical_findings: critical,
                estimated_monthly_savings: store.total_savings(),
            },
            findings,
            recommendations,
            warnings,
        }
    }

    /// Runs `auditors` with at most `self.concurrency` in flight at once,
    /// stopping early (without starting further auditors) once `ctx.cancel`
    /// is observed.
    async fn run_auditors(
        &self,
        ctx: &RunContext,
        auditors: &[Arc<dyn ServiceAuditor>],
        store: Arc<FindingStore>,
        warnings: &mut Vec<String>,
    ) -> HashMap<String, audit_proto::ServiceSummary> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(auditors.len());

        for auditor in auditors {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let auditor = auditor.clone();
            let client = self.client.clone();
            let store = store.clone();
            let ctx = ctx.clone();
            handles.push((
                auditor.name(),
                tokio::spawn(async move {
                    let _permit = permit;
                    auditor.audit(&ctx, client.as_ref(), store.as_ref()).await
                }),
            ));
        }

        let mut results = HashMap::with_capacity(handles.len());
        for (name, handle) in handles {
            let summary = match handle.await {
                Ok(summary) => summary,
                Err(join_err) => {
                    warnings.push(format!("auditor '{name}' panicked: {join_err}"));
                    audit_proto::ServiceSummary::with_error(format!("panicked: {join_err}"))
                }
            };
            results.insert(name.to_string(), summary);
        }
        results
    }
}

/// `ResourceKind`-specific remediation playbook, attached to every
/// recommendation grouped under that kind.
fn actions_for(kind: ResourceKind) -> Vec<String> {
    match kind {
        ResourceKind::Ec2Instance => vec![
            "terminate instances stopped with no plan to restart them".to_string(),
            "right-size or schedule instances idling for more than 7 days".to_string(),
        ],
        ResourceKind::EbsVolume => vec!["snapshot and delete unattached volumes".to_string()],
        ResourceKind::EbsSnapshot => vec!["archive or delete snapshots older than a year".to_string()],
        ResourceKind::ElasticIp => vec!["release elastic IPs not attached to a resource".to_string()],
        ResourceKind::SecurityGroup => {
            vec!["restrict 0.0.0.0/0 ingress on administrative ports to known CIDR ranges".to_string()]
        }
        ResourceKind::LambdaFunction => {
            vec!["confirm stale functions are still invoked, or remove them".to_string()]
        }
        ResourceKind::S3Bucket => vec![
            "enable block public access on every bucket".to_string(),
            "enable default server-side encryption".to_string(),
            "remove empty buckets that serve no purpose".to_string(),
        ],
        ResourceKind::IamUser => vec!["require MFA enrollment for every IAM user".to_string()],
        ResourceKind::IamAccessKey => vec!["rotate access keys older than 90 days".to_string()],
        ResourceKind::RdsInstance => vec![
            "move publicly accessible databases behind a private subnet".to_string(),
            "delete stopped database instances that are no longer needed".to_string(),
        ],
        ResourceKind::Vpc => vec!["migrate workloads off the default VPC".to_string()],
        _ => vec!["review the flagged resources".to_string()],
    }
}

fn build_recommendations(store: &FindingStore) -> Vec<Recommendation> {
    let groups = store.group_by_kind();
    let mut recs: Vec<Recommendation> = groups
        .into_iter()
        .map(|(kind, findings)| {
            let critical_issues = findings
                .iter()
                .filter(|f| f.severity == Severity::Critical)
                .count() as u64;
            let estimated_savings = findings.iter().map(|f| f.estimated_monthly_savings).sum();
            Recommendation {
                kind,
                total_issues: findings.len() as u64,
                critical_issues,
                estimated_savings,
                actions: actions_for(kind),
            }
        })
        .collect();
    recs.sort_by(|a, b| b.estimated_savings.partial_cmp(&a.estimated_savings).unwrap());
    recs
}
