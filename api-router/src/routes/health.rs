use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use common::storage::client::HealthStatus;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

/// Store connectivity: 200 when reachable and not red, else 503.
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.health().await {
        Ok(health) if health.status != HealthStatus::Red => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Connected to search store ({})", health.cluster_name),
            })),
        ),
        Ok(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "cluster status is red" })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": err.to_string() })),
        ),
    }
}

/// Process liveness only; never touches the store.
pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}
