use std::sync::Arc;

use serde_json::{json, Value};

use super::{effective_model, merge_additional, take_array, CallOptions};
use crate::client::InferenceClient;
use crate::error::GatewayError;
use crate::transport::{InvocationRequest, JsonObject};

pub const DEFAULT_NUM_RESULTS: u32 = 3;
pub const DEFAULT_PERSONALIZE_TEMPERATURE: f64 = 0.25;

const RECOMMENDATIONS_ROUTE: &str = "personalize/recommendations";
const MESSAGE_ROUTE: &str = "personalize/message";

/// Recommendations and personalized copy for one end user.
pub struct PersonalizationService {
    client: Arc<InferenceClient>,
    default_model: Option<String>,
}

impl PersonalizationService {
    #[must_use]
    pub fn new(client: Arc<InferenceClient>) -> Self {
        Self {
            client,
            default_model: None,
        }
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Recommended items for a user; empty when the backend returns none.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        context: Value,
        num_results: u32,
        options: &CallOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("user_id".into(), json!(user_id));
        body.insert("context".into(), context);
        body.insert("num_results".into(), json!(num_results));
        merge_additional(&mut body, options.additional.as_ref());

        let mut response = self.invoke(RECOMMENDATIONS_ROUTE, body, options).await?;
        Ok(take_array(&mut response, "results"))
    }

    /// Rewrite `base_message` for the user. Returns an empty string when the
    /// backend answers with neither `personalized_message` nor `result`.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn personalize_message(
        &self,
        user_id: &str,
        base_message: &str,
        context: Value,
        temperature: f64,
        options: &CallOptions,
    ) -> Result<String, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("user_id".into(), json!(user_id));
        body.insert("base_message".into(), json!(base_message));
        body.insert("context".into(), context);
        body.insert("temperature".into(), json!(temperature));
        merge_additional(&mut body, options.additional.as_ref());

        let response = self.invoke(MESSAGE_ROUTE, body, options).await?;
        let text = ["personalized_message", "result"]
            .iter()
            .filter_map(|key| response.get(*key).and_then(Value::as_str))
            .find(|text| !text.is_empty())
            .unwrap_or_default();
        Ok(text.to_string())
    }

    async fn invoke(
        &self,
        route: &str,
        body: JsonObject,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let req = InvocationRequest::json(route, body)
            .with_model(effective_model(options, self.default_model.as_ref()));
        self.client.invoke_json(req).await
    }
}
