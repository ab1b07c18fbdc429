//! Task status polling route.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use doculens_core::TaskStatusView;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_status))]
pub struct StatusApi;

/// Register status routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/id", get(get_status))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// Task ID returned by `POST /read_text`.
    pub task_id: String,
}

/// Poll a task's status (`GET /id?task_id=...`).
///
/// Idempotent and repeatable: returns 202 while the task is queued or
/// running, the raw analysis JSON with 200 once it succeeds, the stored
/// failure status and message once it fails, and 404 for unknown or
/// expired IDs.
#[utoipa::path(
    get,
    path = "/id",
    tag = "analysis",
    params(StatusQuery),
    responses(
        (status = 202, description = "Task is still processing", body = serde_json::Value),
        (status = 200, description = "Analysis result", body = serde_json::Value),
        (status = 400, description = "Malformed task ID"),
        (status = 401, description = "Invalid or missing API key"),
        (status = 404, description = "Task ID not found"),
        (status = 422, description = "Document image was rejected"),
        (status = 500, description = "Analysis failed"),
    ),
    security(("api_key" = []))
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ServerError> {
    let task_id = Uuid::parse_str(&query.task_id)
        .map_err(|_| ServerError::BadRequest(format!("invalid task id: {}", query.task_id)))?;

    let response = match state.status.status(task_id).await {
        TaskStatusView::Pending => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "Processing" }))).into_response()
        }
        TaskStatusView::Succeeded(payload) => (StatusCode::OK, Json(payload)).into_response(),
        TaskStatusView::Failed(failure) => {
            let status = StatusCode::from_u16(failure.status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": failure.message }))).into_response()
        }
        TaskStatusView::NotFound => {
            return Err(ServerError::NotFound("Task ID not found".into()));
        }
    };

    Ok(response)
}
