//! Proxy-event normalization.
//!
//! API Gateway REST (v1), HTTP API (v2), and custom integrations each name the
//! method and path differently. Everything here is a pure transform from the
//! raw event JSON to the values the router needs.

use std::collections::BTreeMap;

use http::Method;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::DispatchError;

/// A body or parameter that could not be parsed under its declared encoding.
///
/// The details are logged but never returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRequest {
    #[error("invalid JSON body: {0}")]
    Json(String),

    #[error("invalid percent-encoding in {field}: {value}")]
    Encoding { field: &'static str, value: String },
}

/// Resolve the effective method and path.
///
/// Overrides win; otherwise the first populated field among the known event
/// shapes is used.
pub fn resolve_method_and_path(
    event: &Value,
    path_override: Option<&str>,
    method_override: Option<&str>,
) -> Result<(Method, String), DispatchError> {
    let method = method_override
        .filter(|m| !m.is_empty())
        .or_else(|| non_empty_str(event.pointer("/requestContext/http/method")))
        .or_else(|| non_empty_str(event.get("httpMethod")))
        .or_else(|| non_empty_str(event.get("method")))
        .ok_or_else(|| DispatchError::Routing("Unable to determine httpMethod".to_string()))?;

    let path = path_override
        .filter(|p| !p.is_empty())
        .or_else(|| non_empty_str(event.get("rawPath")))
        .or_else(|| non_empty_str(event.get("path")))
        .or_else(|| non_empty_str(event.pointer("/requestContext/path")))
        .or_else(|| non_empty_str(event.get("resourcePath")))
        .ok_or_else(|| DispatchError::Routing("Unable to determine path".to_string()))?;

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| DispatchError::Routing(format!("Invalid httpMethod: {}", method)))?;

    Ok((method, path.to_string()))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Strip exactly one trailing `/`. The root path is left alone.
pub fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Collect the scalar entries of a JSON object field as strings.
///
/// Empty strings are kept (`?flag=` yields `flag: ""`); nulls and nested
/// values are dropped.
pub fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| scalar(value).map(|value| (key.clone(), value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Like [`string_map`], but headers with an empty value are dropped too.
pub fn header_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut headers = string_map(value);
    headers.retain(|_, value| !value.is_empty());
    headers
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Collect a multi-value parameter map (`{"key": ["a", "b"]}`).
pub fn multi_value_map(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(key, values)| {
                    let values = match values {
                        Value::Array(items) => items
                            .iter()
                            .filter_map(|item| item.as_str().map(String::from))
                            .collect(),
                        Value::String(s) => vec![s.clone()],
                        _ => Vec::new(),
                    };
                    (key.clone(), values)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Lowercase every header name. Later duplicates win.
pub fn normalize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// Case-insensitive header lookup.
pub fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// True when `header` equals `value` or lists it as one of its `;` parameters,
/// ignoring case.
pub fn has_header_value(header: Option<&str>, value: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    if header.is_empty() || value.is_empty() {
        return false;
    }

    let header = header.to_ascii_lowercase();
    let value = value.to_ascii_lowercase();
    header == value || header.split(';').any(|part| part.trim() == value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEncoding {
    Json,
    Form,
    Opaque,
}

fn body_encoding(content_type: Option<&str>, assume_json: bool) -> BodyEncoding {
    if has_header_value(content_type, "application/json")
        || has_header_value(content_type, "application/merge-patch+json")
        || (content_type.is_none() && assume_json)
    {
        BodyEncoding::Json
    } else if has_header_value(content_type, "application/x-www-form-urlencoded") {
        BodyEncoding::Form
    } else {
        BodyEncoding::Opaque
    }
}

/// Parse a string body according to its content type.
///
/// Non-string and empty bodies are returned unchanged, as are bodies with a
/// content type that is neither JSON nor form-encoded.
pub fn negotiate_body(
    body: Value,
    content_type: Option<&str>,
    assume_json: bool,
) -> Result<Value, MalformedRequest> {
    let text = match &body {
        Value::String(text) if !text.is_empty() => text,
        _ => return Ok(body),
    };

    match body_encoding(content_type, assume_json) {
        BodyEncoding::Json => {
            serde_json::from_str(text).map_err(|e| MalformedRequest::Json(e.to_string()))
        }
        BodyEncoding::Form => {
            let mut fields = Map::new();
            for (key, value) in form_urlencoded::parse(text.as_bytes()) {
                fields.insert(key.into_owned(), Value::String(value.into_owned()));
            }
            Ok(Value::Object(fields))
        }
        BodyEncoding::Opaque => Ok(body),
    }
}

/// Percent-decode one URI component.
///
/// Like `decodeURIComponent`, a `%` that is not followed by two hex digits or
/// a sequence that does not decode to UTF-8 is an error, and `+` is kept.
pub fn decode_component(field: &'static str, value: &str) -> Result<String, MalformedRequest> {
    let bytes = value.as_bytes();
    let malformed = || MalformedRequest::Encoding {
        field,
        value: value.to_string(),
    };

    for (index, byte) in bytes.iter().enumerate() {
        if *byte == b'%' {
            let valid = bytes
                .get(index + 1..index + 3)
                .map(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !valid {
                return Err(malformed());
            }
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| malformed())
}

/// Percent-decode every value in a parameter map.
pub fn decode_parameters(
    field: &'static str,
    parameters: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, MalformedRequest> {
    parameters
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_component(field, value)?)))
        .collect()
}

/// Percent-decode every value in a multi-value parameter map.
pub fn decode_multi_value_parameters(
    field: &'static str,
    parameters: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<String, Vec<String>>, MalformedRequest> {
    parameters
        .iter()
        .map(|(key, values)| {
            let values = values
                .iter()
                .map(|value| decode_component(field, value))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((key.clone(), values))
        })
        .collect()
}

/// Split `url` into its path and parsed query string.
///
/// Values are kept exactly as written; repeated keys accumulate in order.
pub fn split_url(url: &str) -> (String, BTreeMap<String, Vec<String>>) {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let mut parameters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        parameters
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    (path.to_string(), parameters)
}
