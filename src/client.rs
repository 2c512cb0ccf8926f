//! The invocation client: one long-lived instance per process, shared by
//! `Arc` between the domain services and the HTTP route layer.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Instrument;

use crate::config::AppConfig;
use crate::credentials::CredentialResolver;
use crate::error::GatewayError;
use crate::observability::{log_invocation_complete, RequestIdGenerator, TokenUsage};
use crate::secrets::{build_secret_store, SharedSecretStore};
use crate::stream::{ChunkStream, TextDeltaStream};
use crate::transport::{
    check_routing_requirement, shape, ExtraParameters, HttpTransport, InvocationRequest,
    JsonObject, KnownRoute, ShaperDefaults,
};

/// Result of [`InferenceClient::invoke`].
#[derive(Debug)]
pub enum Invocation {
    Json(JsonObject),
    Stream(ChunkStream),
}

impl Invocation {
    /// # Errors
    ///
    /// Returns [`GatewayError::UnexpectedResponse`] for a stream result.
    pub fn into_json(self) -> Result<JsonObject, GatewayError> {
        match self {
            Invocation::Json(object) => Ok(object),
            Invocation::Stream(stream) => {
                stream.cancel();
                Err(GatewayError::UnexpectedResponse(
                    "expected a JSON response, got a stream".into(),
                ))
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::UnexpectedResponse`] for a JSON result.
    pub fn into_stream(self) -> Result<ChunkStream, GatewayError> {
        match self {
            Invocation::Stream(stream) => Ok(stream),
            Invocation::Json(_) => Err(GatewayError::UnexpectedResponse(
                "expected a stream, got a JSON response".into(),
            )),
        }
    }
}

/// One chat message as sent to `chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", text.into())
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text.into())
    }
}

/// Per-call knobs for the chat helpers.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub extra_params: ExtraParameters,
}

pub struct InferenceClient {
    resolver: CredentialResolver,
    transport: HttpTransport,
    defaults: ShaperDefaults,
    request_ids: RequestIdGenerator,
}

impl InferenceClient {
    #[must_use]
    pub fn new(
        resolver: CredentialResolver,
        transport: HttpTransport,
        defaults: ShaperDefaults,
    ) -> Self {
        Self {
            resolver,
            transport,
            defaults,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build a client from configuration using the configured secret store.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_config_with_store(config, build_secret_store(&config.secrets))
    }

    /// Build a client from configuration with an explicit secret store.
    #[must_use]
    pub fn from_config_with_store(config: &AppConfig, store: SharedSecretStore) -> Self {
        Self::new(
            CredentialResolver::from_config(&config.secrets, store),
            HttpTransport::new(&config.server),
            ShaperDefaults::from_config(&config.backend),
        )
    }

    /// True once backend credentials have been resolved.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.resolver.is_resolved()
    }

    #[must_use]
    pub fn defaults(&self) -> &ShaperDefaults {
        &self.defaults
    }

    /// Issue one call against a backend route.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Configuration`] when a routed request has no model;
    ///   checked before credentials are resolved, so no I/O happens at all.
    /// - [`GatewayError::Initialization`] when credentials cannot be resolved.
    /// - [`GatewayError::InvalidRequest`] when the request cannot be shaped;
    ///   no backend I/O happens.
    /// - Transport and upstream errors from the dispatcher.
    pub async fn invoke(&self, req: InvocationRequest) -> Result<Invocation, GatewayError> {
        let request_id = self.request_ids.next_uuid();
        let started = Instant::now();
        check_routing_requirement(&req, &self.defaults).inspect_err(|err| {
            tracing::debug!(request_id = %request_id, error = %err, "request rejected before dispatch");
        })?;
        let credentials = self.resolver.resolve().await?;
        let model = req.model.clone();
        let shaped = shape(req, &credentials, &self.defaults).inspect_err(|err| {
            tracing::debug!(request_id = %request_id, error = %err, "request rejected before dispatch");
        })?;

        let route = shaped.route.clone();
        let span = tracing::info_span!(
            "invoke",
            request_id = %request_id,
            route = %route,
            stream = shaped.stream
        );
        async move {
            if shaped.stream {
                let stream = self.transport.open_stream(shaped).await.inspect_err(|err| {
                    tracing::warn!(error = %err, "backend stream failed to open");
                })?;
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "backend stream opened"
                );
                return Ok(Invocation::Stream(stream));
            }

            let response = self.transport.send_json(shaped).await.inspect_err(|err| {
                tracing::warn!(error = %err, "backend call failed");
            })?;
            let usage = TokenUsage::from_response(&response);
            let reported_model = response
                .get("model")
                .and_then(Value::as_str)
                .or(model.as_deref());
            log_invocation_complete(&route, reported_model, usage.as_ref(), started);
            Ok(Invocation::Json(response))
        }
        .instrument(span)
        .await
    }

    /// [`invoke`](Self::invoke) with streaming forced off.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn invoke_json(&self, req: InvocationRequest) -> Result<JsonObject, GatewayError> {
        self.invoke(req.stream(false)).await?.into_json()
    }

    /// [`invoke`](Self::invoke) with streaming forced on.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn invoke_stream(&self, req: InvocationRequest) -> Result<ChunkStream, GatewayError> {
        self.invoke(req.stream(true)).await?.into_stream()
    }

    // -----------------------------------------------------------------------
    // Convenience helpers
    // -----------------------------------------------------------------------

    /// Single-turn chat with the default deployment.
    ///
    /// # Errors
    ///
    /// See [`chat_messages`](Self::chat_messages).
    pub async fn chat(&self, prompt: &str) -> Result<String, GatewayError> {
        self.chat_messages(vec![ChatMessage::user(prompt)], &ChatOptions::default())
            .await
    }

    /// Chat completion returning the assistant text of the first choice.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnexpectedResponse`] when the response has no
    /// `choices[0].message.content` string, plus any [`invoke`](Self::invoke)
    /// error.
    pub async fn chat_messages(
        &self,
        messages: Vec<ChatMessage>,
        options: &ChatOptions,
    ) -> Result<String, GatewayError> {
        let response = self.invoke_json(chat_request(messages, options)?).await?;
        assistant_text(&response)
    }

    /// Streaming chat completion as a sequence of text fragments.
    ///
    /// # Errors
    ///
    /// Errors raised before the first chunk (initialization, shaping, non-2xx
    /// status) are returned here; later failures arrive through the stream.
    pub async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        options: &ChatOptions,
    ) -> Result<TextDeltaStream, GatewayError> {
        let chunks = self.invoke_stream(chat_request(messages, options)?).await?;
        Ok(chunks.text_deltas())
    }

    /// Text embeddings. `inputs` is a string or a list of strings.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn embeddings(
        &self,
        inputs: impl Into<Value>,
        model: Option<String>,
        extra_params: ExtraParameters,
    ) -> Result<JsonObject, GatewayError> {
        let mut body = JsonObject::new();
        body.insert("input".into(), inputs.into());
        let req = InvocationRequest::json(KnownRoute::Embeddings.path(), body)
            .with_model(model)
            .extra_params(extra_params);
        self.invoke_json(req).await
    }

    /// Embedding of one base64-encoded PNG image.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn image_embeddings(
        &self,
        base64_png: &str,
        model: Option<String>,
        extra_params: ExtraParameters,
    ) -> Result<JsonObject, GatewayError> {
        let req = InvocationRequest::json(
            KnownRoute::ImageEmbeddings.path(),
            image_input_body(base64_png),
        )
        .with_model(model)
        .extra_params(extra_params);
        self.invoke_json(req).await
    }
}

fn chat_request(
    messages: Vec<ChatMessage>,
    options: &ChatOptions,
) -> Result<InvocationRequest, GatewayError> {
    let messages = serde_json::to_value(messages)
        .map_err(|e| GatewayError::InvalidRequest(format!("failed to encode messages: {e}")))?;
    let mut body = JsonObject::new();
    body.insert("messages".into(), messages);
    if let Some(temperature) = options.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = options.max_tokens {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    Ok(
        InvocationRequest::json(KnownRoute::ChatCompletions.path(), body)
            .with_model(options.model.clone())
            .extra_params(options.extra_params),
    )
}

/// Request body carrying a single base64 PNG image input.
#[must_use]
pub fn image_input_body(base64_png: &str) -> JsonObject {
    let mut body = JsonObject::new();
    body.insert(
        "input".into(),
        json!([{ "type": "image", "image_format": "png", "data": base64_png }]),
    );
    body
}

/// `choices[0].message.content` of a chat-completion response.
///
/// # Errors
///
/// Returns [`GatewayError::UnexpectedResponse`] when the field is missing or
/// not a string.
pub fn assistant_text(response: &JsonObject) -> Result<String, GatewayError> {
    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            GatewayError::UnexpectedResponse(
                "response has no choices[0].message.content string".into(),
            )
        })
}
