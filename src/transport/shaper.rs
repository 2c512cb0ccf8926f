use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;

use super::headers::{build_headers, ExtraParameters, APPLICATION_JSON, EVENT_STREAM};
use crate::config::BackendConfig;
use crate::credentials::BackendCredentials;
use crate::error::GatewayError;

pub type JsonObject = serde_json::Map<String, Value>;

const MODEL_FIELD: &str = "model";
const STREAM_FIELD: &str = "stream";

// ---------------------------------------------------------------------------
// Routing table
// ---------------------------------------------------------------------------

/// Which configured default deployment a route falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentKind {
    Chat,
    Embedding,
}

/// Routes whose backend dispatches on the `model` field of the JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownRoute {
    ChatCompletions,
    Embeddings,
    ImageEmbeddings,
}

const ROUTING_TABLE: &[KnownRoute] = &[
    KnownRoute::ChatCompletions,
    KnownRoute::Embeddings,
    KnownRoute::ImageEmbeddings,
];

impl KnownRoute {
    /// Look up a route string in the routing table. Leading and trailing `/`
    /// are ignored.
    #[must_use]
    pub fn from_route(route: &str) -> Option<Self> {
        let route = route.trim_matches('/');
        ROUTING_TABLE
            .iter()
            .copied()
            .find(|known| known.path() == route)
    }

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            KnownRoute::ChatCompletions => "chat/completions",
            KnownRoute::Embeddings => "embeddings",
            KnownRoute::ImageEmbeddings => "images/embeddings",
        }
    }

    #[must_use]
    pub fn deployment_kind(self) -> DeploymentKind {
        match self {
            KnownRoute::ChatCompletions => DeploymentKind::Chat,
            KnownRoute::Embeddings | KnownRoute::ImageEmbeddings => DeploymentKind::Embedding,
        }
    }
}

/// Configured fallbacks for the shaper.
#[derive(Debug, Clone)]
pub struct ShaperDefaults {
    pub api_version: String,
    pub chat_deployment: Option<String>,
    pub embedding_deployment: Option<String>,
}

impl ShaperDefaults {
    #[must_use]
    pub fn from_config(backend: &BackendConfig) -> Self {
        Self {
            api_version: backend.api_version.clone(),
            chat_deployment: backend.default_deployment.clone(),
            embedding_deployment: backend.default_embedding_deployment.clone(),
        }
    }

    #[must_use]
    pub fn deployment_for(&self, kind: DeploymentKind) -> Option<&str> {
        let chosen = match kind {
            DeploymentKind::Chat => self.chat_deployment.as_deref(),
            DeploymentKind::Embedding => self
                .embedding_deployment
                .as_deref()
                .or(self.chat_deployment.as_deref()),
        };
        chosen.map(str::trim).filter(|value| !value.is_empty())
    }
}

impl Default for ShaperDefaults {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Request model
// ---------------------------------------------------------------------------

/// One file part of a multipart payload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Request payload, one encoding per call.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(JsonObject),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
    Raw {
        bytes: Bytes,
        content_type: Option<String>,
    },
}

/// A single call to a backend route.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub route: String,
    pub payload: Payload,
    pub model: Option<String>,
    pub stream: bool,
    pub extra_params: ExtraParameters,
    pub headers: Option<http::HeaderMap>,
    pub api_version: Option<String>,
    pub timeout: Option<Duration>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

impl InvocationRequest {
    #[must_use]
    pub fn new(route: impl Into<String>, payload: Payload) -> Self {
        Self {
            route: route.into(),
            payload,
            model: None,
            stream: false,
            extra_params: ExtraParameters::Reject,
            headers: None,
            api_version: None,
            timeout: None,
            accept: None,
            content_type: None,
        }
    }

    #[must_use]
    pub fn json(route: impl Into<String>, body: JsonObject) -> Self {
        Self::new(route, Payload::Json(body))
    }

    #[must_use]
    pub fn multipart(
        route: impl Into<String>,
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    ) -> Self {
        Self::new(route, Payload::Multipart { fields, files })
    }

    #[must_use]
    pub fn raw(route: impl Into<String>, bytes: Bytes, content_type: Option<String>) -> Self {
        Self::new(
            route,
            Payload::Raw {
                bytes,
                content_type,
            },
        )
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn extra_params(mut self, mode: ExtraParameters) -> Self {
        self.extra_params = mode;
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Shaped output
// ---------------------------------------------------------------------------

/// Encoded request body. Exactly one encoding is ever set.
#[derive(Debug, Clone)]
pub enum WireBody {
    Json(Bytes),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
    Raw(Bytes),
}

/// Everything the transport needs to issue the call.
#[derive(Debug, Clone)]
pub struct ShapedRequest {
    pub route: String,
    pub url: url::Url,
    pub headers: http::HeaderMap,
    pub body: WireBody,
    pub stream: bool,
    pub timeout: Option<Duration>,
}

/// Turn an [`InvocationRequest`] into a concrete HTTP request description.
///
/// # Errors
///
/// - [`GatewayError::Configuration`] when a routed JSON request ends up without
///   a `model` value.
/// - [`GatewayError::InvalidRequest`] for an empty route, an unencodable body,
///   or streaming with a non-JSON payload.
pub fn shape(
    req: InvocationRequest,
    credentials: &BackendCredentials,
    defaults: &ShaperDefaults,
) -> Result<ShapedRequest, GatewayError> {
    let route = req.route.trim().trim_start_matches('/').to_string();
    if route.is_empty() {
        return Err(GatewayError::InvalidRequest("route cannot be empty".into()));
    }
    let known = KnownRoute::from_route(&route);
    let routing_value = effective_routing_value(req.model.as_deref(), known, defaults);

    let effective_accept = req
        .accept
        .clone()
        .or_else(|| req.stream.then(|| EVENT_STREAM.to_string()));

    let (body, content_type) = match req.payload {
        Payload::Json(mut body) => {
            if let Some(model) = routing_value {
                if !body.contains_key(MODEL_FIELD) {
                    body.insert(MODEL_FIELD.to_string(), Value::String(model.to_string()));
                }
            }
            if let Some(known) = known {
                if !has_routing_value(&body) {
                    return Err(missing_routing_value(known));
                }
            }
            if req.stream {
                body.insert(STREAM_FIELD.to_string(), Value::Bool(true));
            }
            let encoded = serde_json::to_vec(&body).map_err(|e| {
                GatewayError::InvalidRequest(format!("failed to encode JSON body: {e}"))
            })?;
            let content_type = req
                .content_type
                .clone()
                .unwrap_or_else(|| APPLICATION_JSON.to_string());
            (WireBody::Json(Bytes::from(encoded)), Some(content_type))
        }
        Payload::Multipart { fields, files } => {
            reject_non_json_stream(req.stream, "multipart")?;
            (WireBody::Multipart { fields, files }, None)
        }
        Payload::Raw {
            bytes,
            content_type,
        } => {
            reject_non_json_stream(req.stream, "raw")?;
            (WireBody::Raw(bytes), content_type)
        }
    };

    let api_version = req
        .api_version
        .as_deref()
        .unwrap_or(defaults.api_version.as_str());
    let url = compose_url(credentials.base_url(), &route, api_version)?;
    let headers = build_headers(
        credentials.api_key(),
        content_type.as_deref(),
        effective_accept.as_deref(),
        req.extra_params,
        req.headers.as_ref(),
    );

    Ok(ShapedRequest {
        route,
        url,
        headers,
        body,
        stream: req.stream,
        timeout: req.timeout,
    })
}

/// Fail fast when a routed JSON request has no routing value from any source.
///
/// Needs no credentials, so the client runs it before resolving them.
///
/// # Errors
///
/// Returns [`GatewayError::Configuration`] under the same condition as
/// [`shape`].
pub fn check_routing_requirement(
    req: &InvocationRequest,
    defaults: &ShaperDefaults,
) -> Result<(), GatewayError> {
    let Payload::Json(body) = &req.payload else {
        return Ok(());
    };
    let Some(known) = KnownRoute::from_route(req.route.trim()) else {
        return Ok(());
    };
    if has_routing_value(body)
        || effective_routing_value(req.model.as_deref(), Some(known), defaults).is_some()
    {
        return Ok(());
    }
    Err(missing_routing_value(known))
}

/// Explicit model first; configured defaults only reach routes that dispatch
/// on `model`.
fn effective_routing_value<'a>(
    explicit: Option<&'a str>,
    known: Option<KnownRoute>,
    defaults: &'a ShaperDefaults,
) -> Option<&'a str> {
    explicit
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .or_else(|| known.and_then(|k| defaults.deployment_for(k.deployment_kind())))
}

fn missing_routing_value(known: KnownRoute) -> GatewayError {
    GatewayError::Configuration(format!(
        "route '{}' requires a model deployment but none was supplied or configured",
        known.path()
    ))
}

fn has_routing_value(body: &JsonObject) -> bool {
    body.get(MODEL_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|model| !model.trim().is_empty())
}

fn reject_non_json_stream(stream: bool, kind: &str) -> Result<(), GatewayError> {
    if stream {
        return Err(GatewayError::InvalidRequest(format!(
            "streaming is only supported for JSON payloads, not {kind}"
        )));
    }
    Ok(())
}

/// Join base URL and route with exactly one `/` and append `api-version`.
///
/// # Errors
///
/// Returns [`GatewayError::Configuration`] when the result is not a valid URL.
pub fn compose_url(base_url: &str, route: &str, api_version: &str) -> Result<url::Url, GatewayError> {
    let base = base_url.trim_end_matches('/');
    let route = route.trim_start_matches('/');
    let mut url = url::Url::parse(&format!("{base}/{route}")).map_err(|e| {
        GatewayError::Configuration(format!("invalid backend URL '{base}/{route}': {e}"))
    })?;
    let api_version = api_version.trim();
    if !api_version.is_empty() {
        url.query_pairs_mut().append_pair("api-version", api_version);
    }
    Ok(url)
}
