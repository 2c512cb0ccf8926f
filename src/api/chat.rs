use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::json;

use super::dto::{ChatRequest, ChatResponse, ChatStreamRequest};
use super::{parse_json, respond};
use crate::client::ChatOptions;
use crate::error::{error_payload, GatewayError};
use crate::services::ChatTurnOptions;
use crate::state::AppState;
use crate::stream::sse::{data_frame, done_frame};
use crate::stream::TextDeltaStream;

/// `GET /chat?prompt=..&model=..`
pub async fn query_handler(State(state): State<Arc<AppState>>, query: Option<&str>) -> Response {
    respond("chat", query_inner(&state, query).await)
}

async fn query_inner(state: &AppState, query: Option<&str>) -> Result<Json<ChatResponse>, GatewayError> {
    let mut prompt = None;
    let mut model = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "prompt" => prompt = Some(value.into_owned()),
            "model" => model = Some(value.into_owned()).filter(|m| !m.is_empty()),
            _ => {}
        }
    }
    let request = ChatRequest {
        prompt: prompt.ok_or_else(|| {
            GatewayError::InvalidRequest("missing 'prompt' query parameter".into())
        })?,
        model,
        system_prompt: None,
        temperature: None,
        max_tokens: None,
    };
    chat(state, request).await
}

/// `POST /chat`
pub async fn post_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let result = match parse_json::<ChatRequest>(&body) {
        Ok(request) => chat(&state, request).await,
        Err(err) => Err(err),
    };
    respond("chat", result)
}

async fn chat(state: &AppState, request: ChatRequest) -> Result<Json<ChatResponse>, GatewayError> {
    request.validate()?;
    let defaults = ChatTurnOptions::default();
    let options = ChatTurnOptions {
        model: request.model,
        system_prompt: request.system_prompt,
        temperature: request.temperature.unwrap_or(defaults.temperature),
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
    };
    let message = state
        .services
        .engagement
        .chat_with_customer(&request.prompt, &options)
        .await?;
    Ok(Json(ChatResponse { message }))
}

/// `POST /chat/stream`
///
/// Failures before the first fragment are ordinary error responses. Once the
/// event stream has started, a failure is reported as a final
/// `data: {"error": ..}` frame and the stream ends without `[DONE]`.
pub async fn stream_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match open_stream(&state, &body).await {
        Ok(deltas) => sse_response(deltas),
        Err(err) => respond::<Response>("chat_stream", Err(err)),
    }
}

async fn open_stream(state: &AppState, body: &[u8]) -> Result<TextDeltaStream, GatewayError> {
    let request = parse_json::<ChatStreamRequest>(body)?;
    request.validate()?;
    let options = ChatOptions {
        model: request.model,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        extra_params: request.extra_parameters,
    };
    state.client.chat_stream(request.messages, &options).await
}

fn sse_response(deltas: TextDeltaStream) -> Response {
    let frames = futures_util::stream::unfold(Some(deltas), |deltas| async move {
        let mut deltas = deltas?;
        let frame = match deltas.next().await {
            Some(Ok(text)) => {
                let frame = data_frame(&json!({ "delta": text }).to_string());
                return Some((Ok::<_, Infallible>(Bytes::from(frame)), Some(deltas)));
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "chat stream ended with an error");
                data_frame(&error_payload(&err).to_string())
            }
            None => done_frame(),
        };
        Some((Ok(Bytes::from(frame)), None))
    });

    let mut response = Body::from_stream(frames).into_response();
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
