//! Structured observability for the audit engine.
//!
//! Provides [`OperationsMetrics`] (atomic counters for audit runs, sampler
//! ticks, and SSE connections) and [`MetricsExporter`], which renders them
//! in Prometheus text format for the `/metrics` introspection endpoint.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// A thread-safe u64 counter backed by an atomic.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Atomic operation counters for the audit engine's key operations.
#[derive(Debug, Default)]
pub struct OperationsMetrics {
    pub audit_runs_total: Counter,
    pub audit_run_errors: Counter,
    pub findings_emitted_total: Counter,
    pub service_auditors_skipped: Counter,
    pub sampler_ticks_total: Counter,
    pub sampler_tick_failures: Counter,
    pub sse_connections_total: Counter,
    pub sse_connections_active: Counter,
    pub dropped_sse_ticks: Counter,
    pub visitor_hits_total: Counter,
}

impl OperationsMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_audit_run(&self, findings: u64, skipped_services: u64) {
        self.audit_runs_total.inc();
        self.findings_emitted_total.add(findings);
        self.service_auditors_skipped.add(skipped_services);
    }

    pub fn record_audit_run_error(&self) {
        self.audit_run_errors.inc();
        warn!(
            counter = "audit_run_errors",
            "audit run recorded a credential or internal error"
        );
    }

    pub fn record_sampler_tick(&self, ok: bool) {
        self.sampler_ticks_total.inc();
        if !ok {
            self.sampler_tick_failures.inc();
        }
    }

    pub fn record_sse_connect(&self) {
        self.sse_connections_total.inc();
        self.sse_connections_active.inc();
    }

    pub fn record_sse_disconnect(&self) {
        self.sse_connections_active
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            })
            .ok();
    }

    pub fn record_dropped_sse_tick(&self) {
        self.dropped_sse_ticks.inc();
    }

    pub fn record_visitor_hit(&self) {
        self.visitor_hits_total.inc();
    }
}

/// Exports [`OperationsMetrics`] in Prometheus text format.
pub struct MetricsExporter {
    metrics: Arc<OperationsMetrics>,
    prefix: String,
}

impl MetricsExporter {
    pub fn new(metrics: Arc<OperationsMetrics>) -> Self {
        Self {
            metrics,
            prefix: "audit_engine".to_string(),
        }
    }

    pub fn with_prefix(metrics: Arc<OperationsMetrics>, prefix: impl Into<String>) -> Self {
        Self {
            metrics,
            prefix: prefix.into(),
        }
    }

    pub fn render(&self) -> String {
        let m = &self.metrics;
        let p = &self.prefix;
        let mut out = String::new();

        self.write_counter(&mut out, p, "audit_runs_total", "Total audit runs completed", m.audit_runs_total.get());
        self.write_counter(&mut out, p, "audit_run_errors", "Total audit runs that hit a credential or internal error", m.audit_run_errors.get());
        self.write_counter(&mut out, p, "findings_emitted_total", "Total findings emitted across all runs", m.findings_emitted_total.get());
        self.write_counter(&mut out, p, "service_auditors_skipped", "Total service auditors skipped due to permission errors", m.service_auditors_skipped.get());
        self.write_counter(&mut out, p, "sampler_ticks_total", "Total telemetry sampler ticks", m.sampler_ticks_total.get());
        self.write_counter(&mut out, p, "sampler_tick_failures", "Total telemetry sampler ticks that failed to read host counters", m.sampler_tick_failures.get());
        self.write_counter(&mut out, p, "sse_connections_total", "Total SSE connections accepted", m.sse_connections_total.get());
        self.write_counter(&mut out, p, "sse_connections_active", "Currently open SSE connections", m.sse_connections_active.get());
        self.write_counter(&mut out, p, "dropped_sse_ticks", "Total SSE ticks dropped due to backpressure", m.dropped_sse_ticks.get());
        self.write_counter(&mut out, p, "visitor_hits_total", "Total dashboard visits recorded", m.visitor_hits_total.get());

        out
    }

    fn write_counter(&self, out: &mut String, prefix: &str, name: &str, help: &str, value: u64) {
        out.push_str(&format!("# HELP {prefix}_{name} {help}\n"));
        out.push_str(&format!("# TYPE {prefix}_{name} counter\n"));
        out.push_str(&format!("{prefix}_{name} {value}\n\n"));
    }
}
