use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    registry_connected: bool,
    cached_models: usize,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry_connected = state.registry.is_reachable().await;

    Json(HealthResponse {
        status: if registry_connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        registry_connected,
        cached_models: state.context.cache().len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
