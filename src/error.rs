use serde_json::json;

/// Error type shared by the dispatcher, the stream decoders and the route layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Initialization error: {0}")]
    Initialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },
    #[error("Upstream stream error: {0}")]
    UpstreamStream(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Unavailable,
    BadGateway,
    GatewayTimeout,
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Configuration(_) | GatewayError::InvalidRequest(_) => {
                ErrorCategory::InvalidRequest
            }
            GatewayError::Initialization(_) => ErrorCategory::Unavailable,
            GatewayError::Timeout(_) => ErrorCategory::GatewayTimeout,
            GatewayError::Upstream { .. }
            | GatewayError::UpstreamStream(_)
            | GatewayError::Decode(_)
            | GatewayError::Transport(_)
            | GatewayError::UnexpectedResponse(_) => ErrorCategory::BadGateway,
        }
    }

    /// Short machine-readable name used in error payloads and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Initialization(_) => "initialization_error",
            GatewayError::Configuration(_) => "configuration_error",
            GatewayError::InvalidRequest(_) => "invalid_request_error",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::UpstreamStream(_) => "upstream_stream_error",
            GatewayError::Decode(_) => "decode_error",
            GatewayError::Timeout(_) => "timeout_error",
            GatewayError::Transport(_) => "transport_error",
            GatewayError::UnexpectedResponse(_) => "unexpected_response_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::GatewayTimeout => http::StatusCode::GATEWAY_TIMEOUT,
    }
}

/// Render an error as `(status_code, JSON body)` for API consumers.
#[must_use]
pub fn format_error(err: &GatewayError) -> (http::StatusCode, serde_json::Value) {
    let status = http_status_for_category(err.category());
    let body = error_payload(err);
    (status, body)
}

/// JSON error object, also used for the final frame of a failed event stream.
#[must_use]
pub fn error_payload(err: &GatewayError) -> serde_json::Value {
    let mut error = json!({
        "type": err.kind(),
        "message": err.to_string(),
    });
    if let GatewayError::Upstream { status, .. } = err {
        error["upstream_status"] = json!(status);
    }
    json!({ "error": error })
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                GatewayError::Configuration("no model".into()),
                http::StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::Initialization("vault down".into()),
                http::StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::Upstream {
                    status: 500,
                    body: "oops".into(),
                },
                http::StatusCode::BAD_GATEWAY,
            ),
            (
                GatewayError::Timeout("60s".into()),
                http::StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(format_error(&err).0, expected, "{err}");
        }
    }

    #[test]
    fn test_upstream_payload_carries_status() {
        let err = GatewayError::Upstream {
            status: 429,
            body: "slow down".into(),
        };
        let payload = error_payload(&err);
        assert_eq!(payload["error"]["type"], "upstream_error");
        assert_eq!(payload["error"]["upstream_status"], 429);
        assert!(payload["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("slow down")));
    }
}
