//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use doculens_core::{Dispatcher, StatusFacade};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Submits uploads into the analysis pipeline.
    pub dispatcher: Dispatcher,
    /// Read-only view over in-flight tasks and stored results.
    pub status: StatusFacade,
}
