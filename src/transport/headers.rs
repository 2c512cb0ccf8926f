use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

pub const API_KEY: HeaderName = HeaderName::from_static("api-key");
pub const EXTRA_PARAMETERS: HeaderName = HeaderName::from_static("extra-parameters");
pub const EVENT_STREAM: &str = "text/event-stream";
pub const APPLICATION_JSON: &str = "application/json";

/// Whether the backend may receive request fields it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtraParameters {
    #[default]
    #[serde(rename = "reject")]
    Reject,
    #[serde(rename = "pass-through")]
    PassThrough,
}

/// Build the outbound header set.
///
/// `content_type: None` omits `Content-Type` so a multipart encoder can set its
/// own boundary. Headers in `extra` are applied last and replace any built-in
/// header of the same name.
#[must_use]
pub fn build_headers(
    api_key: &str,
    content_type: Option<&str>,
    accept: Option<&str>,
    extra_params: ExtraParameters,
    extra: Option<&http::HeaderMap>,
) -> http::HeaderMap {
    let mut headers = http::HeaderMap::with_capacity(4);
    insert_str(&mut headers, API_KEY, api_key);
    if let Some(content_type) = content_type {
        insert_str(&mut headers, CONTENT_TYPE, content_type);
    }
    if let Some(accept) = accept {
        insert_str(&mut headers, ACCEPT, accept);
    }
    if extra_params == ExtraParameters::PassThrough {
        headers.insert(EXTRA_PARAMETERS, HeaderValue::from_static("pass-through"));
    }
    if let Some(extra) = extra {
        for name in extra.keys() {
            headers.remove(name);
        }
        for (name, value) in extra {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn insert_str(headers: &mut http::HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(val) => {
            headers.insert(name, val);
        }
        Err(_) => tracing::warn!(header = %name, "skipping header with invalid value"),
    }
}
