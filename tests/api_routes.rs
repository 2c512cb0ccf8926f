mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use inference_gateway::routing::dispatch::dispatch_request;
use inference_gateway::state::AppState;
use serde_json::{json, Value};

use common::{build_state, chat_completion, json_response, spawn_backend, sse_response, status_response};

const BASE_PATH: &str = "/api/v1";

async fn send(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> Response {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).expect("serialize request")),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("build request");
    dispatch_request(Arc::clone(state), Arc::<str>::from(BASE_PATH), request)
        .await
        .expect("dispatch")
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json payload")
}

#[tokio::test]
async fn test_health_reports_credential_state() {
    let backend = spawn_backend(|_| async { json_response(chat_completion("hello")) }).await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(&state, "GET", "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["status"], "healthy");
    assert_eq!(payload["backend"]["credentials_resolved"], false);

    send(&state, "POST", "/api/v1/chat", Some(json!({"prompt": "hi"}))).await;
    let payload = body_json(send(&state, "GET", "/api/v1/health", None).await).await;
    assert_eq!(payload["backend"]["credentials_resolved"], true);
}

#[tokio::test]
async fn test_post_chat_applies_defaults() {
    let backend = spawn_backend(|_| async { json_response(chat_completion("hello")) }).await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(
        &state,
        "POST",
        "/api/v1/chat",
        Some(json!({"prompt": "hi", "system_prompt": "be brief"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"message": "hello"}));

    let body = backend.last_request().json();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["temperature"], 0.2);
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
    assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
}

#[tokio::test]
async fn test_get_chat_reads_query() {
    let backend = spawn_backend(|_| async { json_response(chat_completion("pong")) }).await;
    let state = build_state(&backend.base_url, None);

    let response = send(&state, "GET", "/api/v1/chat?prompt=ping%20me&model=gpt-4o", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "pong");

    let body = backend.last_request().json();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["messages"][0]["content"], "ping me");

    let response = send(&state, "GET", "/api/v1/chat", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_stream_emits_delta_frames() {
    let backend = spawn_backend(|_| async {
        sse_response(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                "data: [DONE]\n\n",
            )
            .to_string(),
        )
    })
    .await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(
        &state,
        "POST",
        "/api/v1/chat/stream",
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").expect("content type"),
        "text/event-stream"
    );
    assert_eq!(
        body_text(response).await,
        "data: {\"delta\":\"Hel\"}\n\ndata: {\"delta\":\"lo\"}\n\ndata: [DONE]\n\n"
    );
}

#[tokio::test]
async fn test_chat_stream_failure_becomes_final_error_frame() {
    let backend = spawn_backend(|_| async {
        sse_response(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
                "data: {\"error\":{\"message\":\"content filtered\"}}\n\n",
            )
            .to_string(),
        )
    })
    .await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(
        &state,
        "POST",
        "/api/v1/chat/stream",
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], "data: {\"delta\":\"par\"}");
    let error: Value =
        serde_json::from_str(frames[1].trim_start_matches("data: ")).expect("error frame");
    assert_eq!(error["error"]["type"], "upstream_stream_error");
    assert!(!text.contains("[DONE]"));
}

#[tokio::test]
async fn test_chat_stream_upstream_status_before_first_frame() {
    let backend = spawn_backend(|_| async {
        status_response(StatusCode::INTERNAL_SERVER_ERROR, "backend exploded")
    })
    .await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(
        &state,
        "POST",
        "/api/v1/chat/stream",
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["type"], "upstream_error");
    assert_eq!(payload["error"]["upstream_status"], 500);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let backend = spawn_backend(|_| async { json_response(chat_completion("unused")) }).await;
    let state = build_state(&backend.base_url, None);

    // No model anywhere: configuration error, no backend traffic.
    let response = send(&state, "POST", "/api/v1/chat", Some(json!({"prompt": "hi"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "configuration_error");
    assert_eq!(backend.hits(), 0);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = dispatch_request(Arc::clone(&state), Arc::<str>::from(BASE_PATH), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");

    assert_eq!(
        send(&state, "GET", "/api/v1/nope", None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        send(&state, "GET", "/api/v1/search", None).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let oversized = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .body(Body::from(vec![b' '; 3 * 1024 * 1024]))
        .expect("build request");
    let response = dispatch_request(Arc::clone(&state), Arc::<str>::from(BASE_PATH), oversized)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_initialization_failure_is_503() {
    let state = Arc::new(AppState::with_secret_store(
        common::test_config(Some("gpt-4o-mini")),
        Arc::new(inference_gateway::secrets::StaticSecretStore::default()),
    ));
    let response = send(&state, "POST", "/api/v1/chat", Some(json!({"prompt": "hi"}))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["type"], "initialization_error");
}

#[tokio::test]
async fn test_document_extract_and_classify() {
    let backend = spawn_backend(|request| async move {
        json_response(json!({"route": request.path, "fields": {"total": "42.00"}}))
    })
    .await;
    let state = build_state(&backend.base_url, Some("multimodal"));

    let response = send(
        &state,
        "POST",
        "/api/v1/document/extract",
        Some(json!({"document_base64": "aGVsbG8=", "document_type": "invoice"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["extracted_data"]["route"], "/models/images/embeddings");
    let body = backend.last_request().json();
    assert_eq!(body["document_type"], "invoice");
    assert_eq!(body["input"][0]["data"], "aGVsbG8=");
    assert_eq!(body["model"], "multimodal");

    let response = send(
        &state,
        "POST",
        "/api/v1/document/classify",
        Some(json!({"document_base64": "aGVsbG8="})),
    )
    .await;
    let payload = body_json(response).await;
    assert_eq!(payload["extracted_data"]["route"], "/models/chat/completions");
}

#[tokio::test]
async fn test_recommend_and_search_lists() {
    let backend = spawn_backend(|request| async move {
        if request.path.ends_with("personalize/recommendations") {
            json_response(json!({"results": [{"sku": "A1"}, {"sku": "B2"}]}))
        } else {
            json_response(json!({"hits": 0}))
        }
    })
    .await;
    let state = build_state(&backend.base_url, None);

    let response = send(
        &state,
        "POST",
        "/api/v1/personalize/recommend",
        Some(json!({"user_id": "u-1", "context": {"segment": "gold"}})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"recommendations": [{"sku": "A1"}, {"sku": "B2"}]})
    );
    let body = backend.last_request().json();
    assert_eq!(body["num_results"], 3);
    assert_eq!(body["context"]["segment"], "gold");
    assert!(body.get("model").is_none());

    // Missing `results` member reads as an empty list.
    let response = send(
        &state,
        "POST",
        "/api/v1/search",
        Some(json!({"query": "refund policy", "filters": {"lang": "en"}})),
    )
    .await;
    assert_eq!(body_json(response).await, json!({"results": []}));
    let body = backend.last_request().json();
    assert_eq!(body["top_k"], 10);
    assert_eq!(body["filters"]["lang"], "en");
}

#[tokio::test]
async fn test_anomaly_and_embeddings_pass_backend_object() {
    let backend = spawn_backend(|_| async { json_response(json!({"anomalies": [2], "usage": {"prompt_tokens": 3}})) }).await;
    let state = build_state(&backend.base_url, Some("gpt-4o-mini"));

    let response = send(
        &state,
        "POST",
        "/api/v1/ops/anomaly",
        Some(json!({"metrics": [{"t": 1, "v": 3.0}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["anomalies"], json!([2]));
    let request = backend.last_request();
    assert_eq!(request.path, "/models/ops/anomaly-detection");
    assert_eq!(request.json()["sensitivity"], 0.5);

    let response = send(
        &state,
        "POST",
        "/api/v1/embeddings",
        Some(json!({"input": ["a", "b"], "extra_parameters": "pass-through"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let request = backend.last_request();
    assert_eq!(request.path, "/models/embeddings");
    assert_eq!(request.header("extra-parameters"), Some("pass-through"));
    // Falls back to the chat deployment when no embedding default is set.
    assert_eq!(request.json()["model"], "gpt-4o-mini");
}
