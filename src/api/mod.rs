pub mod chat;
pub mod documents;
pub mod dto;
pub mod health;
pub mod insights;

use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// Decode a request body, mapping failures to [`GatewayError::InvalidRequest`].
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed JSON body: {e}")))
}

/// Turn a handler result into a response, logging failures.
pub(crate) fn respond<T: IntoResponse>(endpoint: &str, result: Result<T, GatewayError>) -> Response {
    match result {
        Ok(value) => value.into_response(),
        Err(err) => {
            if matches!(
                err,
                GatewayError::InvalidRequest(_) | GatewayError::Configuration(_)
            ) {
                tracing::debug!(endpoint, error = %err, "request rejected");
            } else {
                tracing::warn!(endpoint, error = %err, "request failed");
            }
            err.into_response()
        }
    }
}
