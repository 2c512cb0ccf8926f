use std::sync::Arc;

use serde_json::{json, Value};

use super::{effective_model, merge_additional, take_array, CallOptions};
use crate::client::InferenceClient;
use crate::error::GatewayError;
use crate::transport::{InvocationRequest, JsonObject};

pub const DEFAULT_SENSITIVITY: f64 = 0.5;
pub const DEFAULT_FORECAST_HORIZON: u32 = 7;

const ANOMALY_ROUTE: &str = "ops/anomaly-detection";
const FORECAST_ROUTE: &str = "ops/forecast-metrics";
const ALERTS_ROUTE: &str = "ops/generate-alerts";

/// Anomaly detection, forecasting and alerting over operational metrics.
pub struct OperationalIntelligenceService {
    client: Arc<InferenceClient>,
    default_model: Option<String>,
}

impl OperationalIntelligenceService {
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

    /// # Errors
    ///
    /// Any invocation error.
    pub async fn detect_anomalies(
        &self,
        metrics: Vec<Value>,
        sensitivity: f64,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("metrics".into(), Value::Array(metrics));
        body.insert("sensitivity".into(), json!(sensitivity));
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(ANOMALY_ROUTE, body, options).await
    }

    /// # Errors
    ///
    /// Any invocation error.
    pub async fn forecast_metrics(
        &self,
        historical_data: Vec<Value>,
        forecast_horizon: u32,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("historical_data".into(), Value::Array(historical_data));
        body.insert("forecast_horizon".into(), json!(forecast_horizon));
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(FORECAST_ROUTE, body, options).await
    }

    /// Alerts generated from an event list; empty when the backend returns none.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn operational_alerts(
        &self,
        event_stream: Vec<Value>,
        alert_types: Option<Vec<String>>,
        options: &CallOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("event_stream".into(), Value::Array(event_stream));
        if let Some(alert_types) = alert_types.filter(|types| !types.is_empty()) {
            body.insert("alert_types".into(), json!(alert_types));
        }
        merge_additional(&mut body, options.additional.as_ref());

        let mut response = self.invoke(ALERTS_ROUTE, body, options).await?;
        Ok(take_array(&mut response, "alerts"))
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
