use std::collections::HashSet;

use http::Method;
use serde_json::{Map, Value};

use super::BatchRequest;
use crate::error::HttpError;
use crate::normalize::header_map;

/// Methods a sub-request may use.
pub const BATCH_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

fn invalid(message: impl std::fmt::Display) -> HttpError {
    HttpError::bad_request(format!("invalid body; {}", message))
}

/// Absent, null, `false`, `0` and `""` all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn display_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validate a parsed batch body and lift it into typed requests.
///
/// Checks run in order and stop at the first violation, which is reported as a
/// 400 naming the request index and field.
pub fn validate_batch_request(
    body: &Value,
    max_batch_size: usize,
) -> Result<Vec<BatchRequest>, HttpError> {
    let object = body.as_object().ok_or_else(|| invalid("expected object"))?;
    let requests = object
        .get("requests")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("expected requests to be an array"))?;

    if requests.is_empty() {
        return Err(invalid("requests must contain at least one element"));
    }
    if requests.len() > max_batch_size {
        return Err(invalid(format!(
            "max number of requests exceeded ({})",
            max_batch_size
        )));
    }

    let known_ids: HashSet<&str> = requests
        .iter()
        .filter_map(|request| request.get("id").and_then(Value::as_str))
        .collect();

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        let empty = Map::new();
        let request = request.as_object().unwrap_or(&empty);
        validated.push(validate_request(index, request, &known_ids, &mut seen)?);
    }

    check_dependency_chain(&validated)?;
    Ok(validated)
}

fn validate_request(
    index: usize,
    request: &Map<String, Value>,
    known_ids: &HashSet<&str>,
    seen: &mut HashSet<String>,
) -> Result<BatchRequest, HttpError> {
    let field = |name: &str| format!("requests[{}].{}", index, name);

    let id = request.get("id");
    if is_missing(id) {
        return Err(invalid(format!("{} required", field("id"))));
    }
    let id = id
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("{} must be a string", field("id"))))?;
    if !seen.insert(id.to_string()) {
        return Err(invalid(format!("{} must be unique", field("id"))));
    }

    let method = request.get("method");
    if is_missing(method) {
        return Err(invalid(format!("{} required", field("method"))));
    }
    let method = method
        .and_then(Value::as_str)
        .filter(|m| BATCH_METHODS.contains(m))
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .ok_or_else(|| {
            invalid(format!(
                "{} must be one of ( {} )",
                field("method"),
                BATCH_METHODS.join(" | ")
            ))
        })?;

    let url = request.get("url");
    if is_missing(url) {
        return Err(invalid(format!("{} required", field("url"))));
    }
    let url = url
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("{} must be a string", field("url"))))?;

    let headers = request.get("headers");
    let supplies_authorization = headers
        .and_then(Value::as_object)
        .is_some_and(|headers| {
            headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case("authorization"))
        });
    if supplies_authorization {
        return Err(invalid(format!(
            "{} can not be supplied",
            field("headers.authorization")
        )));
    }

    let depends_on = match request.get("dependsOn") {
        dependencies if is_missing(dependencies) => Vec::new(),
        Some(Value::Array(dependencies)) => {
            let unknown: Vec<String> = dependencies
                .iter()
                .filter(|dependency| {
                    !dependency
                        .as_str()
                        .is_some_and(|dependency| known_ids.contains(dependency))
                })
                .map(display_id)
                .collect();
            if !unknown.is_empty() {
                return Err(invalid(format!(
                    "{} references invalid id(s): {}",
                    field("dependsOn"),
                    unknown.join(", ")
                )));
            }
            dependencies
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        }
        _ => return Err(invalid(format!("{} must be an array", field("dependsOn")))),
    };

    Ok(BatchRequest {
        id: id.to_string(),
        method,
        url: url.to_string(),
        headers: header_map(headers),
        body: request.get("body").cloned().unwrap_or(Value::Null),
        depends_on,
    })
}

/// Reject dependency graphs that can never fully resolve.
///
/// Resolves requests wave by wave; anything left when a wave makes no progress
/// is in, or downstream of, a cycle and is reported in input order.
pub fn check_dependency_chain(requests: &[BatchRequest]) -> Result<(), HttpError> {
    let mut resolved: HashSet<String> = HashSet::new();
    let mut pending: Vec<&BatchRequest> = requests.iter().collect();

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&BatchRequest>, Vec<&BatchRequest>) = pending
            .into_iter()
            .partition(|request| request.is_ready(&resolved));

        if ready.is_empty() {
            let ids: Vec<&str> = blocked.iter().map(|request| request.id.as_str()).collect();
            return Err(invalid(format!(
                "unable to resolve execution order due to circular dependency chain(s) involving: ({})",
                ids.join(", ")
            )));
        }

        resolved.extend(ready.into_iter().map(|request| request.id.clone()));
        pending = blocked;
    }

    Ok(())
}
