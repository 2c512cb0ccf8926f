#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use inference_gateway::client::InferenceClient;
use inference_gateway::config::{
    AppConfig, BackendConfig, FeaturesConfig, SecretProvider, SecretsConfig, ServerConfig,
};
use inference_gateway::secrets::StaticSecretStore;
use inference_gateway::state::AppState;
use parking_lot::Mutex;
use serde_json::Value;

pub const API_KEY: &str = "backend-secret";

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct MockBackend {
    /// Base URL as stored in the endpoint secret (includes a `/models` prefix).
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    server: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.captured
            .lock()
            .last()
            .cloned()
            .expect("mock backend received a request")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Serve every path with `respond`, recording each request.
pub async fn spawn_backend<F, Fut>(respond: F) -> MockBackend
where
    F: Fn(CapturedRequest) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let captured = Arc::new(Mutex::new(Vec::new()));

    let handler_hits = Arc::clone(&hits);
    let handler_captured = Arc::clone(&captured);
    let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: Bytes| {
        let respond = respond.clone();
        let hits = Arc::clone(&handler_hits);
        let captured = Arc::clone(&handler_captured);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            let request = CapturedRequest {
                path: uri.path().to_string(),
                query: uri.query().map(str::to_string),
                headers,
                body,
            };
            captured.lock().push(request.clone());
            respond(request).await
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend {
        base_url: format!("http://{addr}/models/"),
        hits,
        captured,
        server,
    }
}

pub fn json_response(value: Value) -> Response {
    axum::Json(value).into_response()
}

pub fn status_response(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

pub fn sse_response(body: String) -> Response {
    Response::builder()
        .header("content-type", "text/event-stream")
        .body(Body::from(body))
        .expect("build SSE response")
}

pub fn chat_completion(text: &str) -> Value {
    serde_json::json!({
        "id": "chatcmpl-mock",
        "model": "gpt-4o-mini",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })
}

pub fn test_config(default_deployment: Option<&str>) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        backend: BackendConfig {
            default_deployment: default_deployment.map(str::to_string),
            ..BackendConfig::default()
        },
        secrets: SecretsConfig {
            provider: SecretProvider::Static,
            vault_name: None,
            vault_url: None,
            access_token_env: "AZURE_ACCESS_TOKEN".to_string(),
            env_prefix: String::new(),
            endpoint_secret: "foundry-endpoint".to_string(),
            key_secret: "foundry-key".to_string(),
            values: Default::default(),
        },
        features: FeaturesConfig::default(),
    }
}

pub fn secret_store(base_url: &str) -> Arc<StaticSecretStore> {
    Arc::new(StaticSecretStore::new([
        ("foundry-endpoint", base_url),
        ("foundry-key", API_KEY),
    ]))
}

pub fn build_client(base_url: &str, default_deployment: Option<&str>) -> Arc<InferenceClient> {
    Arc::new(InferenceClient::from_config_with_store(
        &test_config(default_deployment),
        secret_store(base_url),
    ))
}

pub fn build_state(base_url: &str, default_deployment: Option<&str>) -> Arc<AppState> {
    Arc::new(AppState::with_secret_store(
        test_config(default_deployment),
        secret_store(base_url),
    ))
}
