use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use serde_json::Value;

use super::headers::EVENT_STREAM;
use super::shaper::{JsonObject, ShapedRequest, WireBody};
use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::stream::{ChunkStream, SseChunkStream};

/// Upstream error bodies are cut to this many bytes before they reach an
/// error message.
const MAX_ERROR_BODY_BYTES: usize = 4096;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none());
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|err| GatewayError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Issues shaped requests against the backend.
///
/// Non-streaming calls are bounded by a total timeout (per call, or the
/// configured default). Streaming calls use a separate pool with no total
/// timeout so long generations are not cut off.
pub struct HttpTransport {
    request_client: reqwest::Client,
    stream_client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with connection pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let pool_max_idle_per_host = config.http_pool_max_idle_per_host.max(1);
        let default_timeout = Duration::from_secs(config.timeout.max(1));

        Self {
            request_client: client_or_default(build_reqwest_client(
                pool_max_idle_per_host,
                pool_idle_timeout,
                Some(default_timeout),
            )),
            stream_client: client_or_default(build_reqwest_client(
                pool_max_idle_per_host,
                pool_idle_timeout,
                None,
            )),
            default_timeout,
        }
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Send a non-streaming request and return the decoded JSON object.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Timeout`] when the call exceeds its timeout.
    /// - [`GatewayError::Upstream`] for a non-2xx status or a body that is not
    ///   a JSON object.
    /// - [`GatewayError::Transport`] for connection failures.
    pub async fn send_json(&self, shaped: ShapedRequest) -> Result<JsonObject, GatewayError> {
        let started = Instant::now();
        let route = shaped.route.clone();
        let timeout = shaped.timeout.unwrap_or(self.default_timeout);
        let request = build_request(&self.request_client, shaped)?.timeout(timeout);

        let response = request
            .send()
            .await
            .map_err(|err| map_send_error(&err, &route, timeout))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| map_send_error(&err, &route, timeout))?;

        tracing::debug!(
            route = %route,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend response received"
        );

        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(map),
            _ => {
                tracing::warn!(route = %route, status = status.as_u16(), "backend returned a non-object body");
                Err(upstream_error(status, &body))
            }
        }
    }

    /// Open a streaming request and return the decoded chunk sequence.
    ///
    /// A non-2xx status fails here, before any chunk is produced. A success
    /// response that is not an event stream is read whole: a JSON body becomes
    /// a single chunk and anything else yields an empty sequence. The call's
    /// timeout, when set, applies to receiving response headers only.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] for a non-2xx status,
    /// [`GatewayError::Timeout`] when headers do not arrive in time and
    /// [`GatewayError::Transport`] for connection failures.
    pub async fn open_stream(&self, shaped: ShapedRequest) -> Result<ChunkStream, GatewayError> {
        let route = shaped.route.clone();
        let header_timeout = shaped.timeout;
        let request = build_request(&self.stream_client, shaped)?;
        let effective = header_timeout.unwrap_or(self.default_timeout);

        // A per-call timeout bounds only the wait for response headers; the
        // body of an open stream is never cut off.
        let sent = match header_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request.send())
                .await
                .map_err(|_| {
                    GatewayError::Timeout(format!(
                        "stream request to '{route}' got no response within {}ms",
                        timeout.as_millis()
                    ))
                })?,
            None => request.send().await,
        };
        let response = sent.map_err(|err| map_send_error(&err, &route, effective))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(upstream_error(status, &body));
        }

        if is_event_stream(response.headers()) {
            tracing::debug!(route = %route, status = status.as_u16(), "backend event stream opened");
            return Ok(ChunkStream::new(SseChunkStream::new(response.bytes_stream())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| map_send_error(&err, &route, effective))?;
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => {
                tracing::debug!(route = %route, "backend answered a stream request with a single JSON body");
                Ok(ChunkStream::once(value))
            }
            Err(_) => {
                tracing::debug!(route = %route, bytes = body.len(), "backend stream response was neither SSE nor JSON");
                Ok(ChunkStream::empty())
            }
        }
    }
}

fn client_or_default(built: Result<reqwest::Client, GatewayError>) -> reqwest::Client {
    match built {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
            reqwest::Client::new()
        }
    }
}

fn build_request(
    client: &reqwest::Client,
    shaped: ShapedRequest,
) -> Result<reqwest::RequestBuilder, GatewayError> {
    let builder = client.post(shaped.url).headers(shaped.headers);
    Ok(match shaped.body {
        WireBody::Json(bytes) | WireBody::Raw(bytes) => builder.body(bytes),
        WireBody::Multipart { fields, files } => {
            let mut form = reqwest::multipart::Form::new();
            for (name, value) in fields {
                form = form.text(name, value);
            }
            for file in files {
                let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec());
                if let Some(file_name) = file.file_name {
                    part = part.file_name(file_name);
                }
                if let Some(content_type) = file.content_type {
                    part = part.mime_str(&content_type).map_err(|err| {
                        GatewayError::InvalidRequest(format!(
                            "invalid content type '{content_type}' for part '{}': {err}",
                            file.field
                        ))
                    })?;
                }
                form = form.part(file.field, part);
            }
            builder.multipart(form)
        }
    })
}

fn is_event_stream(headers: &http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .get(..EVENT_STREAM.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(EVENT_STREAM))
        })
}

fn map_send_error(err: &reqwest::Error, route: &str, timeout: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(format!(
            "request to '{route}' exceeded {}ms",
            timeout.as_millis()
        ))
    } else {
        GatewayError::Transport(format!("request to '{route}' failed: {err}"))
    }
}

fn upstream_error(status: http::StatusCode, body: &Bytes) -> GatewayError {
    GatewayError::Upstream {
        status: status.as_u16(),
        body: truncated_body_text(body),
    }
}

fn truncated_body_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = text[..end].to_string();
    out.push_str("...");
    out
}
