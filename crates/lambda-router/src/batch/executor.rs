use std::collections::HashSet;

use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use super::{BatchRequest, BatchResponse};
use crate::context::Context;
use crate::error::HttpError;
use crate::event::RouterEvent;
use crate::handler::Dispatch;
use crate::normalize::split_url;

const AUTHORIZATION: &str = "authorization";

/// Run validated requests wave by wave through `dispatcher`.
///
/// Responses come back in resolution order, and in submission order within a
/// wave. A sub-request that fails still counts as resolved, so its dependents
/// run.
pub async fn execute_batch(
    dispatcher: &dyn Dispatch,
    requests: Vec<BatchRequest>,
    parent: &RouterEvent,
    context: &Context,
) -> Result<Vec<BatchResponse>, HttpError> {
    let authorization = parent.header(AUTHORIZATION);
    let mut responses = Vec::with_capacity(requests.len());
    let mut resolved: HashSet<String> = HashSet::new();
    let mut pending = requests;
    let mut wave = 0usize;

    while !pending.is_empty() {
        let (ready, blocked): (Vec<BatchRequest>, Vec<BatchRequest>) = pending
            .into_iter()
            .partition(|request| request.is_ready(&resolved));

        if ready.is_empty() {
            let ids: Vec<&str> = blocked.iter().map(|request| request.id.as_str()).collect();
            error!(?ids, "batch stalled with unresolved requests");
            return Err(HttpError::bad_request("Invalid dependency chain"));
        }

        wave += 1;
        let ids: Vec<&str> = ready.iter().map(|request| request.id.as_str()).collect();
        debug!(wave, ?ids, "dispatching batch wave");

        let results = join_all(
            ready
                .iter()
                .map(|request| execute_request(dispatcher, request, authorization, context)),
        )
        .await;

        for (request, response) in ready.iter().zip(results) {
            resolved.insert(request.id.clone());
            responses.push(response);
        }
        pending = blocked;
    }

    Ok(responses)
}

async fn execute_request(
    dispatcher: &dyn Dispatch,
    request: &BatchRequest,
    authorization: Option<&str>,
    parent: &Context,
) -> BatchResponse {
    let (path, event) = sub_event(request, authorization);
    let context = parent.for_batch_request(&request.id);

    match dispatcher
        .dispatch(event, context, Some(&path), Some(request.method.as_str()))
        .await
    {
        Ok(result) => BatchResponse::from_proxy(&request.id, result.response),
        Err(err) => {
            warn!(id = %request.id, error = %err, "batch sub-request failed to dispatch");
            BatchResponse {
                id: request.id.clone(),
                status: 500,
                body: Some(HttpError::internal(err.to_string()).to_body(false)),
                headers: None,
            }
        }
    }
}

/// Build the proxy event for one sub-request, returning its path alongside.
///
/// Header names are lowercased. The parent's authorization header always
/// replaces any the sub-request carried.
fn sub_event(request: &BatchRequest, authorization: Option<&str>) -> (String, Value) {
    let (path, query) = split_url(&request.url);

    let mut headers: Map<String, Value> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), Value::String(value.clone())))
        .collect();
    headers.remove(AUTHORIZATION);
    if let Some(authorization) = authorization {
        headers.insert(
            AUTHORIZATION.to_string(),
            Value::String(authorization.to_string()),
        );
    }

    let single: Map<String, Value> = query
        .iter()
        .filter_map(|(key, values)| {
            values
                .last()
                .map(|value| (key.clone(), Value::String(value.clone())))
        })
        .collect();

    let event = json!({
        "httpMethod": request.method.as_str(),
        "path": path,
        "headers": headers,
        "body": request.body,
        "queryStringParameters": single,
        "multiValueQueryStringParameters": query,
    });

    (path, event)
}
