use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and whether backend credentials are resolved yet.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "healthy",
        "backend": {
            "credentials_resolved": state.client.is_initialized(),
            "api_version": config.backend.api_version,
            "secret_provider": config.secrets.provider.to_string(),
        }
    }))
}
