//! API-key authentication.
//!
//! Every analysis route requires a valid `X-API-Key` header whose value
//! matches the server's configured key. Requests with a missing or wrong key
//! are rejected with `401 Unauthorized` before reaching any handler.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::state::AppState;

pub static X_API_KEY: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req.headers().get(X_API_KEY).and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.config.api_key => next.run(req).await,
        _ => {
            warn!(path = %req.uri().path(), "rejected request with invalid or missing API key");
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "error": "Invalid or missing API Key" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use doculens_core::analysis::{AnalysisClient, AnalysisError};
    use doculens_core::{CoreConfig, Dispatcher, ResultStore};
    use tower::ServiceExt;

    struct NeverClient;

    #[async_trait::async_trait]
    impl AnalysisClient for NeverClient {
        async fn analyze(&self, _image: &[u8]) -> Result<serde_json::Value, AnalysisError> {
            Err(AnalysisError::Transport("unused".into()))
        }
    }

    fn test_app(api_key: &str) -> Router {
        let mut config = crate::config::Config::for_tests();
        config.api_key = api_key.to_string();
        let store = ResultStore::new();
        let dispatcher =
            Dispatcher::start(&CoreConfig::default(), Arc::new(NeverClient), store.clone());
        let status = dispatcher.status_facade();
        let state = Arc::new(AppState { config: Arc::new(config), dispatcher, status });
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(from_fn_with_state(state.clone(), require_api_key))
            .with_state(state)
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let app = test_app("secret");
        let res = app
            .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let app = test_app("secret");
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(X_API_KEY, "not-the-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_passes_through() {
        let app = test_app("secret");
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(X_API_KEY, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
