//! Seams between the router and user code.
//!
//! Route handlers and middleware are trait objects so that plain `async fn`s,
//! closures, and stateful structs can all be registered. [`Dispatch`] is the
//! narrow contract the batch executor drives; it knows nothing about routes.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::error::{DispatchError, HandlerResult, HttpError};
use crate::event::RouterEvent;
use crate::response::RouterResponse;

/// A route handler.
///
/// Implemented for every `Fn(RouterEvent, Context) -> impl Future<Output = HandlerResult>`,
/// so an `async fn` with that signature can be registered directly:
///
/// ```
/// use lambda_router::{Context, HandlerResult, Reply, RouterEvent};
///
/// async fn hello(event: RouterEvent, _context: Context) -> HandlerResult {
///     Ok(Reply::from(format!("hello from {}", event.path)))
/// }
///
/// let mut router = lambda_router::Router::default();
/// router.get("/hello", hello);
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: RouterEvent, context: Context) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(RouterEvent, Context) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: RouterEvent, context: Context) -> HandlerResult {
        (self)(event, context).await
    }
}

/// Runs before the handler, in registration order.
///
/// Returning an error stops the chain; the error is rendered exactly like a
/// handler error. Synchronous closures implement this trait directly.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before_route(
        &self,
        event: &mut RouterEvent,
        context: &mut Context,
    ) -> Result<(), HttpError>;
}

#[async_trait]
impl<F> Middleware for F
where
    F: Fn(&mut RouterEvent, &mut Context) -> Result<(), HttpError> + Send + Sync,
{
    async fn before_route(
        &self,
        event: &mut RouterEvent,
        context: &mut Context,
    ) -> Result<(), HttpError> {
        (self)(event, context)
    }
}

/// Dispatch a raw event to a response.
///
/// `path` and `method` override whatever the event carries.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        event: Value,
        context: Context,
        path: Option<&str>,
        method: Option<&str>,
    ) -> Result<RouterResponse, DispatchError>;
}

/// Post-processes error bodies: `(status, body) -> body`.
pub type ErrorFormatter = dyn Fn(u16, Value) -> Value + Send + Sync;
