//! Test helpers shared by unit and integration tests.
//!
//! Enabled for this crate's own tests and, for dependent crates, through the
//! `test-utils` feature.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::context::Context;
use crate::error::HandlerResult;
use crate::event::RouterEvent;
use crate::handler::Handler;
use crate::response::Reply;

/// Builder for raw proxy events in the shapes the router understands.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    event: Map<String, Value>,
}

impl EventBuilder {
    /// REST API shape: `httpMethod` + `path`.
    pub fn v1(method: &str, path: &str) -> Self {
        Self::default().field("httpMethod", method).field("path", path)
    }

    /// HTTP API shape: `requestContext.http.method` + `rawPath`.
    pub fn v2(method: &str, path: &str) -> Self {
        Self::default()
            .field("rawPath", path)
            .field("requestContext", json!({"http": {"method": method}}))
    }

    /// Custom integration shape: `method` + `resourcePath`.
    pub fn resource_path(method: &str, path: &str) -> Self {
        Self::default()
            .field("method", method)
            .field("resourcePath", path)
    }

    /// A bare event with neither method nor path.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.event.insert(name.to_string(), value.into());
        self
    }

    pub fn header(self, name: &str, value: &str) -> Self {
        self.entry("headers", name, value)
    }

    pub fn path_parameter(self, name: &str, value: &str) -> Self {
        self.entry("pathParameters", name, value)
    }

    pub fn query_parameter(self, name: &str, value: &str) -> Self {
        self.entry("queryStringParameters", name, value)
    }

    pub fn body(self, body: impl Into<Value>) -> Self {
        self.field("body", body)
    }

    /// Serialize `body` as a string body and declare it as JSON.
    pub fn json_body(self, body: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    pub fn build(self) -> Value {
        Value::Object(self.event)
    }

    fn entry(mut self, field: &str, name: &str, value: &str) -> Self {
        let map = self
            .event
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = map {
            map.insert(name.to_string(), Value::String(value.to_string()));
        }
        self
    }
}

/// Shared, ordered log of handler activity.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Position of `entry` in the log.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Handler that echoes what it received and records `start:<key>` and
/// `end:<key>` around a yield point.
///
/// The key is the batch request id when there is one, otherwise the path.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler {
    log: CallLog,
}

impl EchoHandler {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, event: RouterEvent, context: Context) -> HandlerResult {
        let key = context
            .batch_request_id()
            .map(String::from)
            .unwrap_or_else(|| event.path.clone());
        self.log.record(format!("start:{}", key));
        tokio::task::yield_now().await;
        self.log.record(format!("end:{}", key));

        Ok(Reply::Body(json!({
            "method": event.http_method.as_str(),
            "path": event.path,
            "pathParameters": event.path_parameters,
            "queryStringParameters": event.query_string_parameters,
            "multiValueQueryStringParameters": event.multi_value_query_string_parameters,
            "headers": event.headers,
            "body": event.body,
            "batchRequestId": context.batch_request_id(),
            "traceId": context.trace_id().map(|id| id.as_str()),
        })))
    }
}
