//! Thread-safe, append-only finding collector shared by every auditor in a
//! single run. Caps total findings at 10,000 and silently drops the rest
//! (incrementing a counter an operator can inspect), and deduplicates on
//! `(kind, resource_id, finding_code)` so a retried or re-entrant auditor
//! never double-counts a resource.

use audit_proto::{Finding, ResourceKind, Severity};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Findings accepted per run before further `add` calls are silently dropped.
pub const MAX_FINDINGS_PER_RUN: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    findings: Vec<Finding>,
    seen: HashSet<(ResourceKind, String, String)>,
    dropped: u64,
}

/// Append-only, thread-safe finding collector for one audit run.
#[derive(Debug, Default)]
pub struct FindingStore {
    inner: Mutex<Inner>,
}

impl FindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `finding` unless it duplicates an already-stored
    /// `(kind, resource_id, finding_code)` or the store is at capacity.
    /// Returns `true` if the finding was stored.
    pub fn add(&self, finding: Finding) -> bool {
        let mut inner = self.inner.lock();
        let key = finding.dedup_key();
        if inner.seen.contains(&key) {
            return false;
        }
        if inner.findings.len() >= MAX_FINDINGS_PER_RUN {
            inner.dropped += 1;
            return false;
        }
        inner.seen.insert(key);
        inner.findings.push(finding);
        true
    }

    /// All stored findings, in insertion order.
    pub fn all(&self) -> Vec<Finding> {
        self.inner.lock().findings.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Findings dropped because the run had already reached
    /// [`MAX_FINDINGS_PER_RUN`].
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn group_by_kind(&self) -> HashMap<ResourceKind, Vec<Finding>> {
        let mut groups: HashMap<ResourceKind, Vec<Finding>> = HashMap::new();
        for f in self.inner.lock().findings.iter() {
            groups.entry(f.kind).or_default().push(f.clone());
        }
        groups
    }

    pub fn total_savings(&self) -> f64 {
        self.inner
            .lock()
            .findings
            .iter()
            .map(|f| f.estimated_monthly_savings)
            .sum()
    }

    pub fn count(&self, severity: Severity) -> u64 {
        self.inner
            .lock()
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .count() as u64
    }
}
