use crate::state::AppState;
use audit_core::RunContext;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn err(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: msg.into() }))
}

pub async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_visitor_hit();
    Json(json!({
        "service": "cloudwatchman",
        "description": "cloud cost and security audit engine",
        "docs": ["/health", "/api/real-metrics", "/api/aws/audit", "/info"],
    }))
}

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "environment": format!("{:?}", state.config.env),
        "aws_region": state.config.aws_region,
        "started_at": state.started_at,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.sampler.snapshot();
    let alerts = state.sampler.alerts();
    let visitors_ok = state.visitors.ping().await;

    let has_critical = alerts.iter().any(|a| a.level == audit_proto::AlertLevel::Critical);
    let has_warning = alerts.iter().any(|a| a.level == audit_proto::AlertLevel::Warning);
    let status = if has_critical {
        "critical"
    } else if has_warning || !visitors_ok {
        "degraded"
    } else {
        "healthy"
    };

    Json(json!({
        "status": status,
        "cpu_percent": snapshot.sample.cpu_percent,
        "memory_percent": snapshot.sample.memory_percent,
        "disk_percent": snapshot.sample.disk_percent,
        "checks": {
            "sampler": true,
            "visitor_backend": visitors_ok,
        },
        "alerts": alerts,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "backend": format!("{:?}", state.visitors.backend_kind()),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

pub async fn real_metrics(State(state): State<AppState>) -> Json<telemetry::Snapshot> {
    Json(state.sampler.snapshot())
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_len")]
    n: usize,
}

fn default_history_len() -> usize {
    60
}

pub async fn metrics_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<telemetry::HistoryDto> {
    Json(state.sampler.history(q.n))
}

pub async fn system_alerts(State(state): State<AppState>) -> Json<Vec<audit_proto::Alert>> {
    Json(state.sampler.alerts())
}

pub async fn metrics_live(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.metrics.record_sse_connect();
    let sampler = state.sampler.clone();
    let metrics = state.metrics.clone();
    let stream = stream::unfold((sampler, metrics), |(sampler, metrics)| async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let snapshot = sampler.snapshot();
        let event = match serde_json::to_string(&snapshot) {
            Ok(payload) => Event::default().data(payload),
            Err(_) => {
                metrics.record_dropped_sse_tick();
                Event::default().comment("serialization error")
            }
        };
        Some((Ok(event), (sampler, metrics)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
pub struct CostQuery {
    #[serde(default = "default_cpu")]
    cpu: f64,
    #[serde(default = "default_memory")]
    memory: f64,
}

fn default_cpu() -> f64 {
    1.0
}

fn default_memory() -> f64 {
    2.0
}

const HOURS_PER_DAY: f64 = 24.0;
const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_YEAR: f64 = 365.0;

pub async fn cost(State(state): State<AppState>, Query(q): Query<CostQuery>) -> Json<serde_json::Value> {
    let hourly = q.cpu * state.config.fargate_cpu_price + q.memory * state.config.fargate_memory_price;
    let daily = hourly * HOURS_PER_DAY;
    Json(json!({
        "cpu": q.cpu,
        "memory": q.memory,
        "hourly_cost": hourly,
        "daily_cost": daily,
        "estimated_monthly_cost": daily * DAYS_PER_MONTH,
        "yearly_cost": daily * DAYS_PER_YEAR,
    }))
}

pub async fn visitors(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "total": state.visitors.total().await,
        "backend": format!("{:?}", state.visitors.backend_kind()),
        "recent": state.visitors.recent(),
    }))
}

pub async fn audit_full(State(state): State<AppState>) -> ApiResult<audit_proto::Report> {
    state.metrics.record_audit_run(0, 0);
    let ctx = RunContext::new(Utc::now());
    let report = state.orchestrator.run_full(&ctx).await;
    state.metrics.record_audit_run(report.summary.total_findings, 0);
    Ok(Json(report))
}

pub async fn audit_structured(State(state): State<AppState>) -> ApiResult<audit_proto::Report> {
    let ctx = RunContext::new(Utc::now());
    let report = state.orchestrator.run_structured(&ctx).await;
    state.metrics.record_audit_run(report.summary.total_findings, 0);
    Ok(Json(report))
}

pub async fn audit_quick(State(state): State<AppState>) -> ApiResult<audit_proto::Report> {
    let ctx = RunContext::new(Utc::now());
    let report = state.orchestrator.run_quick(&ctx).await;
    state.metrics.record_audit_run(report.summary.total_findings, 0);
    Ok(Json(report))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let exporter = audit_observe::MetricsExporter::new(state.metrics.clone());
    (
        [("content-type", "text/plain; version=0.0.4")],
        exporter.render(),
    )
}
