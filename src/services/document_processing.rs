use std::sync::Arc;

use serde_json::Value;

use super::{effective_model, merge_additional, CallOptions};
use crate::client::{image_input_body, InferenceClient};
use crate::error::GatewayError;
use crate::transport::{InvocationRequest, JsonObject, KnownRoute};

/// Document extraction and classification from base64 PNG page images.
pub struct DocumentProcessingService {
    client: Arc<InferenceClient>,
    default_model: Option<String>,
}

impl DocumentProcessingService {
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

    /// Extract structured data via the image-embeddings route.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn extract_structured_data(
        &self,
        document_base64: &str,
        document_type: Option<&str>,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = image_input_body(document_base64);
        if let Some(document_type) = document_type.filter(|t| !t.is_empty()) {
            body.insert("document_type".into(), Value::String(document_type.to_string()));
        }
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(KnownRoute::ImageEmbeddings, body, options).await
    }

    /// Classify a document image via chat completions.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub async fn classify_document(
        &self,
        document_base64: &str,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = image_input_body(document_base64);
        merge_additional(&mut body, options.additional.as_ref());
        self.invoke(KnownRoute::ChatCompletions, body, options).await
    }

    async fn invoke(
        &self,
        route: KnownRoute,
        body: JsonObject,
        options: &CallOptions,
    ) -> Result<JsonObject, GatewayError> {
        let req = InvocationRequest::json(route.path(), body)
            .with_model(effective_model(options, self.default_model.as_ref()));
        self.client.invoke_json(req).await
    }
}
