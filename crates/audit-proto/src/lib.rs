//! Shared data model for the cloud cost and security audit engine.
//!
//! Defines the resource taxonomy, the `Finding` record produced by service
//! auditors, the aggregated `Report`, and the host telemetry sample shape
//! shared between the sampler and the HTTP surface.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::VecDeque;

// ─── Resource taxonomy ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Ec2Instance,
    EbsVolume,
    EbsSnapshot,
    ElasticIp,
    Ami,
    SecurityGroup,
    S3Bucket,
    RdsInstance,
    DynamodbTable,
    LambdaFunction,
    IamUser,
    IamRole,
    IamPolicy,
    IamAccessKey,
    KmsKey,
    Vpc,
    CloudfrontDistribution,
    Route53Zone,
    ApiGateway,
    SnsTopic,
    SqsQueue,
    EventbridgeRule,
    CloudwatchAlarm,
    CloudformationStack,
    ElasticacheCluster,
    EfsFilesystem,
    EcsCluster,
    BatchQueue,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

// ─── Finding ───────────────────────────────────────────────────────────────────

/// A single, immutable observation about one audited resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub region: String,
    pub finding_code: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub estimated_monthly_savings: f64,
    pub observed_at: DateTime<Utc>,
}

impl Finding {
    /// The `(kind, resource_id, finding_code)` triple findings are deduplicated on.
    pub fn dedup_key(&self) -> (ResourceKind, String, String) {
        (self.kind, self.resource_id.clone(), self.finding_code.clone())
    }
}

// ─── ServiceSummary ────────────────────────────────────────────────────────────

/// Flat per-service counters. Never references a `Finding`; cross-linking
/// between a summary and the findings it produced is by `(kind, resource_id)`
/// only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub counts: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
}

impl ServiceSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.counts.insert(key.to_string(), value.into());
        self
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            counts: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// The service's reported resource total, if it published one under `total`.
    pub fn total(&self) -> u64 {
        self.counts
            .get("total")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
    }
}

// ─── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Structured,
    Quick,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub account_id: String,
    pub region: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: RunMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_resources: u64,
    pub total_findings: u64,
    pub critical_findings: u64,
    pub estimated_monthly_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: ResourceKind,
    pub total_issues: u64,
    pub critical_issues: u64,
    pub estimated_savings: f64,
    pub actions: Vec<String>,
}

/// Root aggregate of one audit run. Immutable once the orchestrator returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub services: HashMap<String, ServiceSummary>,
    pub findings: Vec<Finding>,
    pub summary: ReportSummary,
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<String>,
}

// ─── Host telemetry ────────────────────────────────────────────────────────────

/// A single host telemetry reading. Floats are rounded to two decimals at
/// read-out time (see `telemetry`'s `Snapshot`), never at store time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSample {
    pub ts: DateTime<Utc>,
    pub cpu_percent: f64,
    pub per_core_cpu: Vec<f64>,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub disk_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub app_rss_mb: f64,
    pub net_sent_kbs: f64,
    pub net_recv_kbs: f64,
    pub process_count: u64,
    pub open_connections: u64,
}

impl MetricsSample {
    pub fn zeroed(ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            cpu_percent: 0.0,
            per_core_cpu: Vec::new(),
            memory_percent: 0.0,
            memory_used_gb: 0.0,
            memory_total_gb: 0.0,
            disk_percent: 0.0,
            disk_used_gb: 0.0,
            disk_total_gb: 0.0,
            app_rss_mb: 0.0,
            net_sent_kbs: 0.0,
            net_recv_kbs: 0.0,
            process_count: 0,
            open_connections: 0,
        }
    }
}

/// A `(timestamp, value)` pair stored in a ring buffer series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Fixed-capacity FIFO with evict-oldest-on-overflow semantics. Used for the
/// CPU/memory/disk history series kept by the telemetry sampler.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a value, evicting the oldest if already at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The most recent `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<T>
    where
        T: Clone,
    {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }
}

/// Alert levels emitted when a metric breaches its configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
}

/// `{ts, client_ip, user_agent_truncated_to_100_chars, sequence_number}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub ts: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    pub sequence_number: i64,
}

impl VisitRecord {
    pub fn new(client_ip: impl Into<String>, user_agent: &str, sequence_number: i64) -> Self {
        let mut truncated: String = user_agent.chars().take(100).collect();
        if truncated.is_empty() {
            truncated = "unknown".to_string();
        }
        Self {
            ts: Utc::now(),
            client_ip: client_ip.into(),
            user_agent: truncated,
            sequence_number,
        }
    }
}
