use crate::handlers;
use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router described by the engine's HTTP surface: dashboard
/// info, host telemetry, the audit endpoints, and `/metrics`/`/info`/
/// `/api/status` introspection.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/info", get(handlers::info))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api/status", get(handlers::status))
        .route("/api/real-metrics", get(handlers::real_metrics))
        .route("/api/metrics/history", get(handlers::metrics_history))
        .route("/api/metrics/live", get(handlers::metrics_live))
        .route("/api/system/alerts", get(handlers::system_alerts))
        .route("/api/cost", get(handlers::cost))
        .route("/api/visitors", get(handlers::visitors))
        .route("/api/aws/audit", get(handlers::audit_full))
        .route("/api/aws/audit/structured", get(handlers::audit_structured))
        .route("/api/aws/audit/quick", get(handlers::audit_quick))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
