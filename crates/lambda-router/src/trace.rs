//! Trace/correlation id resolution.
//!
//! The id is taken from the inbound `X-Trace-Id` or `X-Correlation-Id` header
//! (any casing, trace id first), then from the transport-supplied request id,
//! and is otherwise generated as a UUID v7 (time-sortable).

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::context::Context;

/// Response header carrying the trace id.
pub const TRACE_ID_RESPONSE_HEADER: &str = "X-Correlation-Id";

/// Inbound headers consulted for an existing trace id, in priority order.
pub const TRACE_ID_REQUEST_HEADERS: [&str; 2] = ["x-trace-id", "x-correlation-id"];

/// Correlation id shared by a dispatch, its log span and its response.
///
/// Batch sub-requests resolve their own, usually inheriting the parent
/// request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a dispatch with no upstream id and no request id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TraceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TraceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// First non-empty trace header, trace id before correlation id.
pub fn extract_trace_id(headers: &BTreeMap<String, String>) -> Option<TraceId> {
    TRACE_ID_REQUEST_HEADERS.iter().find_map(|wanted| {
        headers
            .iter()
            .find(|(name, value)| name.eq_ignore_ascii_case(wanted) && !value.is_empty())
            .map(|(_, value)| TraceId::from(value.as_str()))
    })
}

/// Resolve the trace id for a dispatch: headers, then context, then a new id.
pub fn resolve_trace_id(headers: &BTreeMap<String, String>, context: &Context) -> TraceId {
    extract_trace_id(headers)
        .or_else(|| context.request_id().map(TraceId::from))
        .unwrap_or_else(TraceId::generate)
}
