//! Router and batch configuration.
//!
//! Both structs deserialize from camelCase JSON with every field optional, so
//! deployments can ship a partial configuration document:
//!
//! ```
//! use lambda_router::{Cors, RouterConfig};
//!
//! let config: RouterConfig =
//!     serde_json::from_str(r#"{"cors": "https://example.com", "assumeJson": true}"#).unwrap();
//! assert_eq!(config.cors, Cors::Origin("https://example.com".to_string()));
//! assert!(config.assume_json);
//! assert!(config.normalize_headers);
//! ```

use serde::{Deserialize, Serialize};

use crate::response::Headers;

/// Header carrying the request content type. Default responses always set it.
pub const CONTENT_TYPE: &str = "content-type";

/// Header carrying the CORS origin when enabled.
pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "access-control-allow-origin";

/// Content type used when the handler does not provide one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Default upper bound on sub-requests per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// Cross-origin policy applied to every response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cors {
    Disabled,
    /// `access-control-allow-origin: *`
    #[default]
    AnyOrigin,
    Origin(String),
}

impl Cors {
    /// The header value to emit, if any.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Cors::Disabled => None,
            Cors::AnyOrigin => Some("*"),
            Cors::Origin(origin) => Some(origin),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CorsRepr {
    Flag(bool),
    Origin(String),
}

impl Serialize for Cors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Cors::Disabled => CorsRepr::Flag(false),
            Cors::AnyOrigin => CorsRepr::Flag(true),
            Cors::Origin(origin) => CorsRepr::Origin(origin.clone()),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cors {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match CorsRepr::deserialize(deserializer)? {
            CorsRepr::Flag(false) => Cors::Disabled,
            CorsRepr::Flag(true) => Cors::AnyOrigin,
            CorsRepr::Origin(origin) => Cors::Origin(origin),
        })
    }
}

impl From<bool> for Cors {
    fn from(enabled: bool) -> Self {
        if enabled {
            Cors::AnyOrigin
        } else {
            Cors::Disabled
        }
    }
}

impl From<&str> for Cors {
    fn from(origin: &str) -> Self {
        Cors::Origin(origin.to_string())
    }
}

/// Options recognized by [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Populate `path_parameters` from `{token}` template segments.
    pub extract_path_parameters: bool,
    /// Strip one trailing `/` from paths longer than `/`.
    pub trim_trailing_slash: bool,
    /// Assign a trace id and mirror it into `X-Correlation-Id`.
    pub include_trace_id: bool,
    /// Expose `HttpError::stack` in error bodies. Keep off in production.
    pub include_error_stack: bool,
    pub cors: Cors,
    /// Negotiate string bodies into JSON or form values.
    pub parse_body: bool,
    /// Treat bodies without a content type as JSON.
    pub assume_json: bool,
    /// Percent-decode path and query parameters.
    pub decode_event: bool,
    /// Lowercase request header names.
    pub normalize_headers: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            extract_path_parameters: true,
            trim_trailing_slash: true,
            include_trace_id: true,
            include_error_stack: false,
            cors: Cors::AnyOrigin,
            parse_body: true,
            assume_json: false,
            decode_event: true,
            normalize_headers: true,
        }
    }
}

impl RouterConfig {
    /// Headers applied underneath every response.
    pub fn default_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE.to_string(), DEFAULT_CONTENT_TYPE.to_string());
        if let Some(origin) = self.cors.origin() {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN.to_string(), origin.to_string());
        }
        headers
    }
}

/// Options for a batch endpoint registered with [`Router::batch`](crate::Router::batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Maximum number of sub-requests accepted in one batch.
    pub max_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }
}
