//! Handler-facing request view.

use std::collections::BTreeMap;

use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;
use crate::normalize::{find_header, header_map, multi_value_map, string_map};

/// One inbound request, normalized for handlers.
///
/// Built fresh for every dispatch. Parameter maps are always present, even
/// when the event omitted them.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterEvent {
    pub http_method: Method,
    /// Resolved path, after trailing-slash handling.
    pub path: String,
    /// Request headers, lowercased when header normalization is on.
    pub headers: BTreeMap<String, String>,
    /// Request headers exactly as received.
    pub raw_headers: BTreeMap<String, String>,
    /// Parsed body when negotiation succeeded, otherwise the body as received.
    /// `Value::Null` means no body.
    pub body: Value,
    /// The body string as received, before negotiation.
    pub raw_body: Option<String>,
    pub is_base64_encoded: bool,
    pub path_parameters: BTreeMap<String, String>,
    pub query_string_parameters: BTreeMap<String, String>,
    pub multi_value_query_string_parameters: BTreeMap<String, Vec<String>>,
    /// The event exactly as the transport delivered it.
    pub raw: Value,
}

impl RouterEvent {
    /// Lift a raw proxy event into the handler view.
    ///
    /// `method` and `path` are resolved by the caller; every other field is
    /// read from the event as-is.
    pub fn from_raw(raw: Value, http_method: Method, path: impl Into<String>) -> Self {
        let headers = header_map(raw.get("headers"));
        let body = raw.get("body").cloned().unwrap_or(Value::Null);
        let raw_body = body.as_str().map(String::from);

        Self {
            http_method,
            path: path.into(),
            raw_headers: headers.clone(),
            headers,
            body,
            raw_body,
            is_base64_encoded: raw
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            path_parameters: string_map(raw.get("pathParameters")),
            query_string_parameters: string_map(raw.get("queryStringParameters")),
            multi_value_query_string_parameters: multi_value_map(
                raw.get("multiValueQueryStringParameters"),
            ),
            raw,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters.get(name).map(String::as_str)
    }

    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_string_parameters.get(name).map(String::as_str)
    }

    /// All values supplied for a repeated query key, in order.
    pub fn query_parameters(&self, name: &str) -> &[String] {
        self.multi_value_query_string_parameters
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_null()
    }

    /// Deserialize the negotiated body into a typed payload.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| HttpError::bad_request(format!("invalid body; {}", e)))
    }
}
