//! Batch execution of inter-dependent sub-requests.
//!
//! A batch body lists sub-requests, each optionally naming the ids it depends
//! on. Requests are validated up front, then executed in waves: every request
//! whose dependencies have all completed runs concurrently with its wave
//! peers, and the next wave starts once the whole wave has finished.
//!
//! Sub-requests go back through the owning router via [`Dispatch`], so they
//! see the same normalization, middleware and error formatting as top-level
//! requests.

mod executor;
mod validate;

use std::collections::{BTreeMap, HashSet};

use http::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::BatchConfig;
use crate::context::Context;
use crate::error::HandlerResult;
use crate::event::RouterEvent;
use crate::handler::Dispatch;
use crate::response::{CustomResponse, Headers, ProxyResponse, Reply};

pub use executor::execute_batch;
pub use validate::{check_dependency_chain, validate_batch_request, BATCH_METHODS};

/// One validated sub-request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub id: String,
    pub method: Method,
    /// Path plus optional query string.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// `Value::Null` when the sub-request has no body.
    pub body: Value,
    pub depends_on: Vec<String>,
}

impl BatchRequest {
    /// True once every dependency is in `resolved`.
    pub fn is_ready(&self, resolved: &HashSet<String>) -> bool {
        self.depends_on.iter().all(|id| resolved.contains(id))
    }
}

/// Outcome of one sub-request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub id: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

impl BatchResponse {
    /// Lift a sub-dispatch result, parsing its body back into JSON.
    ///
    /// An empty body stays absent; a body that is not JSON is kept as a string.
    pub fn from_proxy(id: impl Into<String>, response: ProxyResponse) -> Self {
        let body = if response.body.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
        };

        Self {
            id: id.into(),
            status: response.status_code,
            body,
            headers: Some(response.headers),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchResponses {
    responses: Vec<BatchResponse>,
}

/// Validate and execute the batch carried by `event`, answering with
/// `200 {"responses": [...]}` in resolution order.
pub async fn handle_batch(
    dispatcher: &dyn Dispatch,
    config: &BatchConfig,
    event: &RouterEvent,
    context: &Context,
) -> HandlerResult {
    let requests = validate_batch_request(&event.body, config.max_batch_size)?;
    info!(requests = requests.len(), "executing batch");

    let responses = execute_batch(dispatcher, requests, event, context).await?;
    let body = serde_json::to_value(BatchResponses { responses })?;

    Ok(Reply::Custom(CustomResponse::new(200).with_body(body)))
}
