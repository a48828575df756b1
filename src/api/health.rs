//! Health check and metrics endpoints.
//!
//! Provides:
//! - `/healthz`: liveness, always 200 while the process runs
//! - `/readyz`: readiness, 503 until the database answers and the watch
//!   session is streaming
//! - `/metrics`: Prometheus text exposition

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use eventscope_core::metrics::global;
use eventscope_core::{ConnectionPhase, EventStore};
use serde::Serialize;
use tokio::sync::watch;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub phase: ConnectionPhase,
    pub version: &'static str,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub phase: ConnectionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Liveness check: the process is up; the phase is informational
async fn healthz(
    Extension(phase): Extension<watch::Receiver<ConnectionPhase>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        phase: *phase.borrow(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check: database reachable and watch session streaming
async fn readyz(
    Extension(store): Extension<EventStore>,
    Extension(phase): Extension<watch::Receiver<ConnectionPhase>>,
) -> (StatusCode, Json<ReadyResponse>) {
    let phase = *phase.borrow();

    if let Err(e) = store.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "error",
                phase,
                details: Some(format!("db not ready: {e}")),
            }),
        );
    }

    if phase != ConnectionPhase::Streaming {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not_ready",
                phase,
                details: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadyResponse {
            status: "ready",
            phase,
            details: None,
        }),
    )
}

/// Prometheus metrics endpoint
async fn metrics_endpoint() -> String {
    global::export_prometheus()
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_endpoint))
}
