//! Request routing for serverless HTTP handlers.
//!
//! This crate turns heterogeneous proxy-integration events into one
//! handler-facing contract and back into wire-level proxy responses:
//!
//! - [`Router`]: route table, middleware chain, unknown-route handling, error
//!   formatting and trace-id propagation
//! - [`matcher`]: literal-first path template matching with `{token}` capture
//! - [`normalize`]: method/path resolution across event shapes, header casing,
//!   body negotiation and percent-decoding
//! - [`batch`]: validated, dependency-ordered execution of sub-requests in
//!   concurrent waves
//! - [`logging`]: JSON or text `tracing` output
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Router::route(event, context)                               │
//! │  - resolve method/path, normalize headers                    │
//! │  - match route, parse body, decode parameters                │
//! │  - assign trace id, run middleware                           │
//! │  - call handler (or batch executor, or unknown-route)        │
//! │  - build ProxyResponse                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides event builders and a recording handler.
//! Enable the `test-utils` feature to access it from dependent crates.

pub mod batch;
mod config;
mod context;
mod error;
mod event;
mod handler;
pub mod logging;
pub mod matcher;
pub mod normalize;
mod response;
mod router;
mod trace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use batch::{BatchRequest, BatchResponse};
pub use config::{
    BatchConfig, Cors, RouterConfig, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
    DEFAULT_CONTENT_TYPE, DEFAULT_MAX_BATCH_SIZE,
};
pub use context::{Context, ResponseCapability, AWS_REQUEST_ID};
pub use error::{DispatchError, HandlerResult, HttpError};
pub use event::RouterEvent;
pub use handler::{Dispatch, ErrorFormatter, Handler, Middleware};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use response::{
    create_proxy_response, merge_headers, serialize_body, CustomResponse, Headers,
    ProxyResponse, Reply, RouterResponse,
};
pub use router::{RouteTarget, Router};
pub use trace::{
    extract_trace_id, resolve_trace_id, TraceId, TRACE_ID_REQUEST_HEADERS,
    TRACE_ID_RESPONSE_HEADER,
};

pub use async_trait::async_trait;
pub use http::Method;
