//! Per-dispatch context.
//!
//! A [`Context`] carries the caller's own properties, the transport request id,
//! the trace id assigned by the router, and the response capability. The
//! capability is attached exactly once, by the dispatch that owns the context.

use std::sync::{Arc, Mutex};

use http::Method;
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::response::{CustomResponse, Headers, Reply};
use crate::trace::TraceId;

/// Caller context property consulted for the transport request id.
pub const AWS_REQUEST_ID: &str = "awsRequestId";

/// Handle that lets a handler shape its response.
///
/// Headers set through it are merged into the final response, underneath any
/// headers of a custom response.
#[derive(Debug, Clone, Default)]
pub struct ResponseCapability {
    headers: Arc<Mutex<Headers>>,
}

impl ResponseCapability {
    fn set_header(&self, name: String, value: String) {
        let mut headers = self
            .headers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        headers.insert(name, value);
    }

    /// Snapshot of the headers set so far.
    pub fn headers(&self) -> Headers {
        self.headers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    properties: Map<String, Value>,
    request_id: Option<String>,
    trace_id: Option<TraceId>,
    batch_request_id: Option<String>,
    allowed_methods: Vec<Method>,
    response: Option<ResponseCapability>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from the caller's own properties.
    ///
    /// An `awsRequestId` string property doubles as the request id.
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        let request_id = properties
            .get(AWS_REQUEST_ID)
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            properties,
            request_id,
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Request id supplied by the invocation wrapper.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Trace id assigned by the router, when trace ids are enabled.
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// Id of the batch sub-request this dispatch serves.
    pub fn batch_request_id(&self) -> Option<&str> {
        self.batch_request_id.as_deref()
    }

    /// Methods registered for the requested path, as seen by an unknown-route
    /// handler. Empty when the path is not registered at all.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn is_batch_request(&self) -> bool {
        self.batch_request_id.is_some()
    }

    pub fn has_response_capability(&self) -> bool {
        self.response.is_some()
    }

    /// Wrap a descriptor as a custom response.
    pub fn response(&self, response: CustomResponse) -> Reply {
        Reply::Custom(response)
    }

    /// Add one header to whatever response this dispatch produces.
    ///
    /// Has no effect on a context that is not being dispatched.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        match &self.response {
            Some(capability) => capability.set_header(name.into(), value.into()),
            None => tracing::warn!("set_header called outside of a dispatch; header dropped"),
        }
    }

    /// Attach the response capability, failing if one is already present.
    pub(crate) fn attach_response(&mut self) -> Result<ResponseCapability, DispatchError> {
        if self.response.is_some() {
            return Err(DispatchError::Configuration(
                "context.response has already been assigned; the router reserves it for custom responses"
                    .to_string(),
            ));
        }
        let capability = ResponseCapability::default();
        self.response = Some(capability.clone());
        Ok(capability)
    }

    pub(crate) fn set_allowed_methods(&mut self, allowed: Vec<Method>) {
        self.allowed_methods = allowed;
    }

    pub(crate) fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = Some(trace_id);
    }

    /// Fresh context for a batch sub-request.
    ///
    /// Caller properties and request id carry over; the response capability
    /// and trace id do not.
    pub(crate) fn for_batch_request(&self, id: impl Into<String>) -> Self {
        Self {
            properties: self.properties.clone(),
            request_id: self.request_id.clone(),
            trace_id: None,
            batch_request_id: Some(id.into()),
            allowed_methods: Vec::new(),
            response: None,
        }
    }
}
