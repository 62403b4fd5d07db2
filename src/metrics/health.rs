//! Health check endpoints and Prometheus metrics surface
//!
//! This module provides the HTTP endpoints for health checks and
//! Prometheus metrics for the tempo-hall session service using Axum.
//! The routes are mounted on the same server as the WebSocket gateway.

use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::session::manager::SessionCore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Shared state for the monitoring endpoints
#[derive(Clone)]
pub struct HealthState {
    pub core: Arc<SessionCore>,
    pub metrics: Arc<MetricsCollector>,
    pub started_at: Instant,
}

/// Build the monitoring router
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "tempo-hall",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/alive", "/metrics", "/stats", "/ws"],
    }))
}

async fn health_handler(State(state): State<HealthState>) -> Response {
    match HealthCheck::check(state.core.clone()).await {
        Ok(report) => {
            let status_code = match report.status {
                HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status_code, Json(report)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn alive_handler() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

async fn metrics_handler(State(state): State<HealthState>) -> Response {
    state
        .metrics
        .set_uptime(state.started_at.elapsed().as_secs());

    let metric_families = state.metrics.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}

async fn stats_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let overview = state.core.overview().await;
    Json(json!({
        "overview": overview,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
