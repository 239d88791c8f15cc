//! HTTP surface for the audit engine, built on `axum`: the dashboard
//! landing page, host telemetry endpoints (including the `/api/metrics/live`
//! SSE stream), the three `/api/aws/audit*` run modes, visitor stats, and
//! the `/metrics`/`/info`/`/api/status` introspection endpoints.

#![forbid(unsafe_code)]

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::api_routes;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use audit_config::Config;
    use audit_core::FakeCloudClient;
    use audit_observe::OperationsMetrics;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use telemetry::{AlertThresholds, TelemetrySampler};
    use tower::ServiceExt;
    use visitor::{BackendKind, InMemoryStore, VisitorCounter};

    fn test_state() -> AppState {
        let sampler = Arc::new(TelemetrySampler::new(
            Duration::from_secs(5),
            AlertThresholds::default(),
        ));
        let client: Arc<dyn audit_core::CloudClient> =
            Arc::new(FakeCloudClient::new("123456789012", "ap-south-1"));
        let visitors = Arc::new(VisitorCounter::with_backend(
            Arc::new(InMemoryStore::default()),
            BackendKind::InMemory,
        ));
        AppState::new(
            Arc::new(Config::from_env()),
            sampler,
            client,
            visitors,
            Arc::new(OperationsMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = api_routes(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_quick_audit_endpoint_returns_quick_mode() {
        let app = api_routes(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/aws/audit/quick")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_prometheus_metrics_endpoint_has_content_type() {
        let app = api_routes(test_state());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
