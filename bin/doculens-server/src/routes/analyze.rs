//! Document submission route.
//!
//! Accepts a document photo via multipart/form-data upload, spools it to a
//! per-task file, and submits it to the analysis pipeline. The HTTP request
//! returns as soon as the task is queued; the heavy lifting (quality gate +
//! external vision analysis) happens on the worker pool and is polled via
//! `GET /id`.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(read_text))]
pub struct AnalyzeApi;

/// Register submission routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/read_text", post(read_text))
}

/// Multipart upload shape (documentation only; parsing is manual).
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct ReadTextUpload {
    /// The document photo to analyse.
    #[schema(value_type = String, format = Binary)]
    image: String,
}

/// Submit a document photo for text extraction (`POST /read_text`).
///
/// Accepts a single `image` multipart field. The upload is spooled to disk
/// under a randomized name, queued, and a task ID is returned immediately
/// with HTTP 202. Poll `GET /id?task_id=...` for the outcome.
#[utoipa::path(
    post,
    path = "/read_text",
    tag = "analysis",
    request_body(content = ReadTextUpload, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Task accepted", body = serde_json::Value),
        (status = 400, description = "Bad request (missing or unreadable image field)"),
        (status = 401, description = "Invalid or missing API key"),
        (status = 413, description = "File too large"),
        (status = 500, description = "Failed to queue the image"),
    ),
    security(("api_key" = []))
)]
pub async fn read_text(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    debug!("received multipart analysis request");

    let mut image_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        match field.name() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read image field: {e}")))?;
                image_bytes = Some(bytes.to_vec());
            }
            other => {
                debug!(field = ?other, "ignoring unexpected multipart field");
            }
        }
    }

    let image_bytes = image_bytes
        .ok_or_else(|| ServerError::BadRequest("missing multipart field 'image'".into()))?;
    if image_bytes.is_empty() {
        return Err(ServerError::BadRequest("uploaded image is empty".into()));
    }

    // Spool under a randomized name; the pipeline takes ownership of the file
    // and deletes it when the task reaches a terminal state.
    let spool_path = state.config.spool_dir.join(format!("{}.img", Uuid::new_v4()));
    tokio::fs::write(&spool_path, &image_bytes)
        .await
        .map_err(|e| ServerError::SubmitFailed(format!("could not spool upload: {e}")))?;

    let task_id = match state.dispatcher.submit(spool_path.clone()).await {
        Ok(id) => id,
        Err(e) => {
            // The pipeline never saw the file; reclaim it here.
            if let Err(rm) = tokio::fs::remove_file(&spool_path).await {
                warn!(path = %spool_path.display(), error = %rm, "failed to remove spool file");
            }
            return Err(ServerError::SubmitFailed(e.to_string()));
        }
    };

    info!(%task_id, bytes = image_bytes.len(), "document queued for analysis");
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "id": task_id }))))
}
