//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `DOCULENS_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - API-key-protected analysis routes (`/read_text`, `/id`)

mod analyze;
pub mod doc;
mod health;
mod status;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{auth, cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    // Analysis routes sit behind the API-key check; health does not, so
    // load-balancers can probe without credentials.
    let protected = Router::new()
        .merge(analyze::router())
        .merge(status::router())
        .layer(from_fn_with_state(state.clone(), auth::require_api_key))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size_mb * 1024 * 1024));

    let mut app = Router::new().merge(health::router()).merge(protected);

    // ── Swagger UI ────────────────────────────────────────────────────────────
    // Enabled by default; disable with DOCULENS_ENABLE_SWAGGER=false in
    // production to avoid exposing the API structure to potential attackers.
    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(axum::middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
