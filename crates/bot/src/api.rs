//! Status API: liveness, sanitized config and Prometheus metrics.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use marquee_core::SanitizedConfig;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

async fn get_metrics() -> String {
    encode_metrics()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
