use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::api_state::ApiState;

/// Full reload. Per-file problems come back inside `report`; only a fatal
/// run failure answers 500.
pub async fn load_data(State(state): State<ApiState>) -> impl IntoResponse {
    match state.orchestrator.run_full_reload().await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!(
                    "Loaded {} documents from {} files",
                    report.documents_indexed(),
                    report.files_processed
                ),
                "report": report,
            })),
        ),
        Err(err) => {
            error!(error = %err, "reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
        }
    }
}
