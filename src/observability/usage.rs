use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::transport::JsonObject;

/// Token counts reported by the backend in a response `usage` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Read the `usage` member of a response, if any.
    ///
    /// A missing or zero total is computed from the prompt and completion
    /// counts; reported non-zero totals are kept as-is.
    #[must_use]
    pub fn from_response(response: &JsonObject) -> Option<Self> {
        let usage = response.get("usage")?.as_object()?;
        let count = |name: &str| usage.get(name).and_then(Value::as_u64);

        let prompt_tokens = count("prompt_tokens");
        let completion_tokens = count("completion_tokens");
        let total_tokens = match count("total_tokens") {
            Some(v) if v > 0 => Some(v),
            _ if prompt_tokens.is_some() || completion_tokens.is_some() => {
                Some(prompt_tokens.unwrap_or(0) + completion_tokens.unwrap_or(0))
            }
            _ => None,
        };

        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}

/// Log token usage for a completed backend call at INFO level.
pub fn log_invocation_usage(route: &str, model: &str, usage: &TokenUsage, duration: Duration) {
    info!(
        route = route,
        model = model,
        prompt_tokens = usage.prompt_tokens.unwrap_or(0),
        completion_tokens = usage.completion_tokens.unwrap_or(0),
        total_tokens = usage.total_tokens.unwrap_or(0),
        elapsed_ms = duration.as_millis() as u64,
        "invocation completed"
    );
}
