//! Shared application state handed to every handler through axum's
//! `State` extractor.

use audit_config::Config;
use audit_core::{AuditOrchestrator, CloudClient};
use audit_observe::OperationsMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use telemetry::TelemetrySampler;
use visitor::VisitorCounter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sampler: Arc<TelemetrySampler>,
    pub orchestrator: Arc<AuditOrchestrator>,
    pub visitors: Arc<VisitorCounter>,
    pub metrics: Arc<OperationsMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        sampler: Arc<TelemetrySampler>,
        client: Arc<dyn CloudClient>,
        visitors: Arc<VisitorCounter>,
        metrics: Arc<OperationsMetrics>,
    ) -> Self {
        Self {
            config,
            sampler,
            orchestrator: Arc::new(AuditOrchestrator::new(client)),
            visitors,
            metrics,
            started_at: Utc::now(),
        }
    }
}
