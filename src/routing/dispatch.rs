use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, documents, health, insights};
use crate::error::GatewayError;
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostRoute {
    Chat,
    ChatStream,
    DocumentExtract,
    DocumentClassify,
    Recommend,
    Anomaly,
    Search,
    Index,
    Embeddings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMatch {
    Health,
    ChatQuery,
    Post(PostRoute),
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());

    let response = match route {
        RouteMatch::Health => health::health_handler(State(state)).into_response(),
        RouteMatch::ChatQuery => chat::query_handler(State(state), parts.uri.query()).await,
        RouteMatch::Post(post_route) => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            let state = State(state);
            match post_route {
                PostRoute::Chat => chat::post_handler(state, body_bytes).await,
                PostRoute::ChatStream => chat::stream_handler(state, body_bytes).await,
                PostRoute::DocumentExtract => documents::extract_handler(state, body_bytes).await,
                PostRoute::DocumentClassify => {
                    documents::classify_handler(state, body_bytes).await
                }
                PostRoute::Recommend => insights::recommend_handler(state, body_bytes).await,
                PostRoute::Anomaly => insights::anomaly_handler(state, body_bytes).await,
                PostRoute::Search => insights::search_handler(state, body_bytes).await,
                PostRoute::Index => insights::index_handler(state, body_bytes).await,
                PostRoute::Embeddings => insights::embeddings_handler(state, body_bytes).await,
            }
        }
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    Ok(response)
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                axum::Json(crate::error::error_payload(&GatewayError::InvalidRequest(
                    "Request body too large (max 2MiB)".into(),
                ))),
            )
                .into_response()
        })
}

fn match_route(method: &Method, path: &str, base_path: &str) -> RouteMatch {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };

    let post = |route: PostRoute| {
        if method == Method::POST {
            RouteMatch::Post(route)
        } else {
            RouteMatch::MethodNotAllowed
        }
    };

    match path {
        "/health" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/chat" => {
            if method == Method::GET {
                RouteMatch::ChatQuery
            } else {
                post(PostRoute::Chat)
            }
        }
        "/chat/stream" => post(PostRoute::ChatStream),
        "/document/extract" => post(PostRoute::DocumentExtract),
        "/document/classify" => post(PostRoute::DocumentClassify),
        "/personalize/recommend" => post(PostRoute::Recommend),
        "/ops/anomaly" => post(PostRoute::Anomaly),
        "/search" => post(PostRoute::Search),
        "/index" => post(PostRoute::Index),
        "/embeddings" => post(PostRoute::Embeddings),
        _ => RouteMatch::NotFound,
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
