//! Request and response bodies of the HTTP route layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ChatMessage;
use crate::error::GatewayError;
use crate::services::IndexDocument;
use crate::transport::{ExtraParameters, JsonObject};

fn require_non_empty(value: &str, field: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(format!(
            "'{field}' must not be empty"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(&self.prompt, "prompt")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub extra_parameters: ExtraParameters,
}

impl ChatStreamRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        if self.messages.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "'messages' must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRequest {
    pub document_base64: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DocumentRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(&self.document_base64, "document_base64")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub extracted_data: JsonObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default)]
    pub context: JsonObject,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub num_results: Option<u32>,
}

impl RecommendationRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(&self.user_id, "user_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyRequest {
    pub metrics: Vec<Value>,
    #[serde(default)]
    pub sensitivity: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub filters: Option<JsonObject>,
}

impl SearchRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(&self.query, "query")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsRequest {
    pub input: Value,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub extra_parameters: ExtraParameters,
}

impl EmbeddingsRequest {
    pub(crate) fn validate(&self) -> Result<(), GatewayError> {
        match &self.input {
            Value::String(text) if !text.is_empty() => Ok(()),
            Value::Array(items) if !items.is_empty() => Ok(()),
            _ => Err(GatewayError::InvalidRequest(
                "'input' must be a non-empty string or list".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexRequest {
    pub documents: Vec<IndexDocument>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}
