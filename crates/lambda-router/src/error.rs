use serde_json::{Map, Value};
use thiserror::Error;

use crate::response::Headers;

/// Convenient result alias for handler and middleware return values.
pub type HandlerResult<T = crate::Reply> = std::result::Result<T, HttpError>;

/// Errors that escape [`Router::route`](crate::Router::route).
///
/// Anything a handler or middleware raises is folded into a response; only
/// integration mistakes surface here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The router was driven incorrectly, e.g. a context was reused after it
    /// already received a response capability.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The inbound event carried neither a method nor a path, and no override
    /// was supplied.
    #[error("routing error: {0}")]
    Routing(String),
}

/// Structured HTTP error raised by handlers, middleware, and the router itself.
///
/// Serialization into a response body is explicit: `extra` fields first, then
/// `message` and `name`, then `stack` when the router is configured to expose it.
///
/// # Example
///
/// ```
/// use lambda_router::HttpError;
///
/// let error = HttpError::new(409, "Item already exists")
///     .with_name("ConflictError")
///     .with_extra("itemId", "abc-123");
/// assert_eq!(error.status_code, 409);
/// ```
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct HttpError {
    /// Response status code.
    pub status_code: u16,
    /// Human-readable message, always present in the response body.
    pub message: String,
    /// Error class name, always present in the response body.
    pub name: String,
    /// Headers merged over the response headers.
    pub headers: Option<Headers>,
    /// Diagnostic trace, only serialized when `includeErrorStack` is enabled.
    pub stack: Option<String>,
    /// Additional body fields.
    pub extra: Map<String, Value>,
}

impl HttpError {
    /// Create an error with the default `Error` name.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            name: "Error".to_string(),
            headers: None,
            stack: None,
            extra: Map::new(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// 405 Method Not Allowed, advertising the accepted methods in `Allow`.
    pub fn method_not_allowed(message: impl Into<String>, allowed: &[String]) -> Self {
        Self::new(405, message).with_header("Allow", allowed.join(","))
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build the JSON error body.
    pub fn to_body(&self, include_stack: bool) -> Value {
        let mut body = self.extra.clone();
        body.insert("message".to_string(), Value::String(self.message.clone()));
        body.insert("name".to_string(), Value::String(self.name.clone()));
        if include_stack {
            if let Some(stack) = &self.stack {
                body.insert("stack".to_string(), Value::String(stack.clone()));
            }
        }
        Value::Object(body)
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::internal(err.to_string()).with_stack(format!("{:?}", err))
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::internal(err.to_string()).with_name("SerdeJsonError")
    }
}
