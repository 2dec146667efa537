//! Wire-level proxy responses and the handler-facing reply type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{CONTENT_TYPE, DEFAULT_CONTENT_TYPE};

/// Flat response header map. Names keep the casing they were inserted with.
pub type Headers = BTreeMap<String, String>;

/// Response shape expected by HTTP proxy integrations.
///
/// The body is always a string: structured bodies are JSON-serialized and
/// string bodies pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_base64_encoded: Option<bool>,
}

impl ProxyResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Handler-built response descriptor that bypasses default 200 wrapping.
///
/// # Example
///
/// ```
/// use lambda_router::CustomResponse;
///
/// let created = CustomResponse::new(201)
///     .with_body("nothing")
///     .with_header("location", "/items/1");
/// assert_eq!(created.status_code, 201);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl Default for CustomResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl CustomResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            body: None,
            headers: Headers::new(),
            is_base64_encoded: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Mark the body as base64-encoded binary content.
    pub fn base64_encoded(mut self) -> Self {
        self.is_base64_encoded = true;
        self
    }
}

/// What a handler hands back to the router.
///
/// The variant is the discriminant: a `Custom` reply is used verbatim, anything
/// else is sent as a 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Reply {
    /// No body.
    Empty,
    /// A 200 response with this body.
    Body(Value),
    /// A fully described response.
    Custom(CustomResponse),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Body(value)
    }
}

impl From<CustomResponse> for Reply {
    fn from(response: CustomResponse) -> Self {
        Reply::Custom(response)
    }
}

impl From<String> for Reply {
    fn from(body: String) -> Self {
        Reply::Body(Value::String(body))
    }
}

impl From<&str> for Reply {
    fn from(body: &str) -> Self {
        Reply::Body(Value::String(body.to_string()))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

/// Result of one dispatch, with the bookkeeping used for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterResponse {
    /// Literal template of the matched route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Resolved request path.
    pub uri: String,
    /// True for 2xx statuses.
    pub is_ok: bool,
    pub response: ProxyResponse,
}

impl RouterResponse {
    pub fn new(response: ProxyResponse, endpoint: Option<String>, uri: impl Into<String>) -> Self {
        Self {
            endpoint,
            uri: uri.into(),
            is_ok: (200..300).contains(&response.status_code),
            response,
        }
    }
}

/// Serialize a body for the wire: strings verbatim, absent as empty, anything
/// else as JSON.
pub fn serialize_body(body: Option<&Value>) -> String {
    match body {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Overlay `overlay` onto `headers`. An overlaid name replaces an existing
/// entry that differs only in case.
pub fn merge_headers(headers: &mut Headers, overlay: impl IntoIterator<Item = (String, String)>) {
    for (name, value) in overlay {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        headers.insert(name, value);
    }
}

/// Build a proxy response, defaulting `content-type` when absent.
pub fn create_proxy_response(
    status_code: u16,
    body: Option<&Value>,
    mut headers: Headers,
    is_base64_encoded: Option<bool>,
) -> ProxyResponse {
    if !headers.keys().any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE)) {
        headers.insert(CONTENT_TYPE.to_string(), DEFAULT_CONTENT_TYPE.to_string());
    }

    ProxyResponse {
        status_code,
        body: serialize_body(body),
        headers,
        is_base64_encoded,
    }
}
