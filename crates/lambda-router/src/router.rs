//! The router: route table, middleware chain and the per-dispatch lifecycle.

use async_trait::async_trait;
use http::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info_span, warn, Instrument};

use crate::batch::handle_batch;
use crate::config::{BatchConfig, RouterConfig};
use crate::context::{Context, ResponseCapability};
use crate::error::{DispatchError, HandlerResult, HttpError};
use crate::event::RouterEvent;
use crate::handler::{Dispatch, ErrorFormatter, Handler, Middleware};
use crate::matcher::{Route, RouteMatch, RouteTable};
use crate::normalize::{
    decode_multi_value_parameters, decode_parameters, find_header, negotiate_body,
    normalize_headers, resolve_method_and_path, trim_trailing_slash, MalformedRequest,
};
use crate::response::{
    create_proxy_response, merge_headers, Headers, ProxyResponse, Reply, RouterResponse,
};
use crate::trace::{resolve_trace_id, TRACE_ID_RESPONSE_HEADER};

/// What a registered route dispatches to.
pub enum RouteTarget {
    Handler(Box<dyn Handler>),
    /// Batch endpoint; sub-requests are dispatched back through the router.
    Batch(BatchConfig),
}

/// Request router for proxy-integration events.
///
/// Routes and middleware are registered up front; dispatch only reads them.
///
/// ```
/// use lambda_router::{Context, HandlerResult, Reply, Router, RouterEvent};
/// use serde_json::json;
///
/// async fn get_item(event: RouterEvent, _context: Context) -> HandlerResult {
///     Ok(Reply::from(json!({ "id": event.path_parameter("id") })))
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let mut router = Router::default();
/// router.get("/items/{id}", get_item);
///
/// let event = json!({ "httpMethod": "GET", "path": "/items/42" });
/// let result = router.route(event, Context::new()).await.unwrap();
/// assert_eq!(result.response.status_code, 200);
/// assert_eq!(result.response.body, r#"{"id":"42"}"#);
/// assert_eq!(result.endpoint.as_deref(), Some("/items/{id}"));
/// # });
/// ```
pub struct Router {
    config: RouterConfig,
    default_headers: Headers,
    routes: RouteTable<RouteTarget>,
    middleware: Vec<Box<dyn Middleware>>,
    unknown: Option<Box<dyn Handler>>,
    error_formatter: Option<Box<ErrorFormatter>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            default_headers: config.default_headers(),
            config,
            routes: RouteTable::new(),
            middleware: Vec::new(),
            unknown: None,
            error_formatter: None,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registered `(method, template)` pairs, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes
            .iter()
            .map(|route| (&route.method, route.path.as_str()))
    }

    /// Register `handler` for `method` on the path template `path`.
    pub fn on(
        &mut self,
        method: Method,
        path: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> &mut Self {
        self.routes
            .push(method, path, RouteTarget::Handler(Box::new(handler)));
        self
    }

    pub fn get(&mut self, path: impl Into<String>, handler: impl Handler + 'static) -> &mut Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(&mut self, path: impl Into<String>, handler: impl Handler + 'static) -> &mut Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: impl Into<String>, handler: impl Handler + 'static) -> &mut Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: impl Handler + 'static) -> &mut Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(
        &mut self,
        path: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> &mut Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Register a batch endpoint as a `POST` route on `path`.
    pub fn batch(&mut self, path: impl Into<String>, config: BatchConfig) -> &mut Self {
        self.routes.push(Method::POST, path, RouteTarget::Batch(config));
        self
    }

    /// Append a middleware to the chain.
    pub fn before_route(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Replace the default 404/405 handler.
    pub fn unknown(&mut self, handler: impl Handler + 'static) -> &mut Self {
        self.unknown = Some(Box::new(handler));
        self
    }

    /// Post-process every error body.
    pub fn format_error(
        &mut self,
        formatter: impl Fn(u16, Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.error_formatter = Some(Box::new(formatter));
        self
    }

    /// Dispatch a raw proxy event.
    pub async fn route(
        &self,
        event: Value,
        context: Context,
    ) -> Result<RouterResponse, DispatchError> {
        self.route_to(event, context, None, None).await
    }

    /// Dispatch a raw proxy event, overriding its path and/or method.
    ///
    /// Fails only when `context` already carries a response capability or the
    /// method or path cannot be determined. Every other failure becomes a
    /// response.
    pub async fn route_to(
        &self,
        raw: Value,
        mut context: Context,
        path_override: Option<&str>,
        method_override: Option<&str>,
    ) -> Result<RouterResponse, DispatchError> {
        let capability = context.attach_response().inspect_err(|err| {
            error!(error = %err, "refusing to dispatch");
        })?;

        let (method, path) = resolve_method_and_path(&raw, path_override, method_override)?;
        let path = if self.config.trim_trailing_slash {
            trim_trailing_slash(&path).to_string()
        } else {
            path
        };

        let mut event = RouterEvent::from_raw(raw, method, path);
        if self.config.normalize_headers {
            event.headers = normalize_headers(&event.raw_headers);
        }

        let (route, allowed) = match self.routes.find(&event.http_method, &event.path) {
            RouteMatch::Matched { route, params } => {
                if self.config.extract_path_parameters {
                    event.path_parameters.extend(params);
                }
                (Some(route), Vec::new())
            }
            RouteMatch::MethodNotAllowed { allowed } => (None, allowed),
            RouteMatch::NotFound => (None, Vec::new()),
        };
        let endpoint = route.map(|route| route.path.clone());
        let uri = event.path.clone();

        if let Err(err) = self.parse_and_decode(&mut event) {
            warn!(error = %err, path = %uri, "malformed request");
            let response = create_proxy_response(
                400,
                Some(&json!({ "message": "Malformed request" })),
                self.default_headers.clone(),
                None,
            );
            return Ok(RouterResponse::new(response, Some(uri.clone()), uri));
        }

        let mut headers = self.default_headers.clone();
        if self.config.include_trace_id {
            let trace_id = resolve_trace_id(&event.headers, &context);
            headers.insert(TRACE_ID_RESPONSE_HEADER.to_string(), trace_id.to_string());
            context.set_trace_id(trace_id);
        }

        let span = info_span!(
            "dispatch",
            trace_id = context.trace_id().map(|id| id.as_str()),
            method = %event.http_method,
            path = %uri,
        );
        let outcome = self
            .run(route, &allowed, event, context)
            .instrument(span)
            .await;

        let response = self.respond(outcome, headers, &capability);
        debug!(
            status = response.status_code,
            endpoint = endpoint.as_deref(),
            path = %uri,
            "request dispatched"
        );
        Ok(RouterResponse::new(response, endpoint, uri))
    }

    fn parse_and_decode(&self, event: &mut RouterEvent) -> Result<(), MalformedRequest> {
        if self.config.parse_body {
            let content_type = find_header(&event.headers, "content-type").map(String::from);
            let body = std::mem::take(&mut event.body);
            event.body = negotiate_body(body, content_type.as_deref(), self.config.assume_json)?;
        }
        if self.config.decode_event {
            debug!("decoding parameters");
            event.path_parameters = decode_parameters("pathParameters", &event.path_parameters)?;
            event.query_string_parameters =
                decode_parameters("queryStringParameters", &event.query_string_parameters)?;
            event.multi_value_query_string_parameters = decode_multi_value_parameters(
                "multiValueQueryStringParameters",
                &event.multi_value_query_string_parameters,
            )?;
        }
        Ok(())
    }

    async fn run(
        &self,
        route: Option<&Route<RouteTarget>>,
        allowed: &[Method],
        mut event: RouterEvent,
        mut context: Context,
    ) -> HandlerResult {
        for middleware in &self.middleware {
            middleware.before_route(&mut event, &mut context).await?;
        }

        match route.map(|route| &route.target) {
            Some(RouteTarget::Handler(handler)) => handler.handle(event, context).await,
            Some(RouteTarget::Batch(config)) => handle_batch(self, config, &event, &context).await,
            None => match &self.unknown {
                Some(handler) => {
                    context.set_allowed_methods(allowed.to_vec());
                    handler.handle(event, context).await
                }
                None => Err(unknown_route(&event.http_method, &event.path, allowed)),
            },
        }
    }

    fn respond(
        &self,
        outcome: HandlerResult,
        mut headers: Headers,
        capability: &ResponseCapability,
    ) -> ProxyResponse {
        merge_headers(&mut headers, capability.headers());

        match outcome {
            Ok(Reply::Custom(custom)) => {
                merge_headers(&mut headers, custom.headers);
                create_proxy_response(
                    custom.status_code,
                    custom.body.as_ref(),
                    headers,
                    custom.is_base64_encoded.then_some(true),
                )
            }
            Ok(Reply::Body(Value::Null)) | Ok(Reply::Empty) => {
                create_proxy_response(200, None, headers, None)
            }
            Ok(Reply::Body(body)) => create_proxy_response(200, Some(&body), headers, None),
            Err(err) => {
                let status = err.status_code;
                if status >= 500 {
                    error!(status, error = %err, name = %err.name, "handler failed");
                } else {
                    debug!(status, error = %err, "handler returned an error response");
                }

                let mut body = err.to_body(self.config.include_error_stack);
                if let Some(error_headers) = err.headers {
                    merge_headers(&mut headers, error_headers);
                }
                if let Some(formatter) = &self.error_formatter {
                    body = formatter(status, body);
                }
                create_proxy_response(status, Some(&body), headers, None)
            }
        }
    }
}

#[async_trait]
impl Dispatch for Router {
    async fn dispatch(
        &self,
        event: Value,
        context: Context,
        path: Option<&str>,
        method: Option<&str>,
    ) -> Result<RouterResponse, DispatchError> {
        self.route_to(event, context, path, method).await
    }
}

/// Default unknown-route outcome: 405 with `Allow` when the path exists under
/// other methods, 404 otherwise.
fn unknown_route(method: &Method, path: &str, allowed: &[Method]) -> HttpError {
    let message = format!("Endpoint not supported: {}{}", method, path);
    if allowed.is_empty() {
        HttpError::not_found(message)
    } else {
        let allowed: Vec<String> = allowed.iter().map(Method::to_string).collect();
        HttpError::method_not_allowed(message, &allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cors;
    use crate::response::CustomResponse;
    use crate::test_utils::{CallLog, EchoHandler, EventBuilder};

    async fn ok_get(_event: RouterEvent, _context: Context) -> HandlerResult {
        Ok(Reply::from("get"))
    }

    async fn ok_get_by_id(event: RouterEvent, _context: Context) -> HandlerResult {
        Ok(Reply::from(json!({ "id": event.path_parameter("id") })))
    }

    async fn fails(_event: RouterEvent, _context: Context) -> HandlerResult {
        Err(HttpError::internal("boom"))
    }

    async fn created(_event: RouterEvent, context: Context) -> HandlerResult {
        Ok(context.response(CustomResponse::new(201).with_body("nothing")))
    }

    fn body(result: &RouterResponse) -> Value {
        serde_json::from_str(&result.response.body).unwrap()
    }

    async fn dispatch(router: &Router, event: Value) -> RouterResponse {
        router.route(event, Context::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_literal_route_precedes_tokenized() {
        let mut router = Router::default();
        router.get("/get/{id}", ok_get_by_id).get("/get", ok_get);

        let result = dispatch(&router, EventBuilder::v1("GET", "/get").build()).await;
        assert_eq!(result.response.body, "get");
        assert_eq!(result.endpoint.as_deref(), Some("/get"));
        assert_eq!(result.uri, "/get");
        assert!(result.is_ok);
    }

    #[tokio::test]
    async fn test_token_extraction() {
        let mut router = Router::default();
        router.get("/get", ok_get).get("/get/{id}", ok_get_by_id);

        let result = dispatch(&router, EventBuilder::v1("GET", "/get/123abc").build()).await;
        assert_eq!(body(&result), json!({"id": "123abc"}));
        assert_eq!(result.endpoint.as_deref(), Some("/get/{id}"));
    }

    #[tokio::test]
    async fn test_token_extraction_can_be_disabled() {
        let mut router = Router::new(RouterConfig {
            extract_path_parameters: false,
            ..RouterConfig::default()
        });
        router.get("/get/{id}", ok_get_by_id);

        let result = dispatch(&router, EventBuilder::v1("GET", "/get/123abc").build()).await;
        assert_eq!(body(&result), json!({"id": null}));
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_registered_methods() {
        let mut router = Router::default();
        router.put("/route", ok_get).post("/route", ok_get);

        let result = dispatch(&router, EventBuilder::v1("DELETE", "/route").build()).await;
        assert_eq!(result.response.status_code, 405);
        let allow = result.response.header("allow").unwrap();
        let mut methods: Vec<&str> = allow.split(',').collect();
        methods.sort_unstable();
        assert_eq!(methods, vec!["POST", "PUT"]);
        assert_eq!(
            body(&result)["message"],
            "Endpoint not supported: DELETE/route"
        );
        assert!(result.endpoint.is_none());
        assert!(!result.is_ok);
    }

    #[tokio::test]
    async fn test_unregistered_path_is_not_found() {
        let mut router = Router::default();
        router.put("/route", ok_get);

        let result = dispatch(&router, EventBuilder::v1("DELETE", "/unregistered").build()).await;
        assert_eq!(result.response.status_code, 404);
        assert!(result.response.header("allow").is_none());
    }

    #[tokio::test]
    async fn test_custom_unknown_handler() {
        async fn teapot(_event: RouterEvent, _context: Context) -> HandlerResult {
            Err(HttpError::new(418, "short and stout"))
        }
        let mut router = Router::default();
        router.unknown(teapot);

        let result = dispatch(&router, EventBuilder::v1("GET", "/nowhere").build()).await;
        assert_eq!(result.response.status_code, 418);
    }

    #[tokio::test]
    async fn test_custom_unknown_handler_sees_allowed_methods() {
        async fn allow_list(_event: RouterEvent, context: Context) -> HandlerResult {
            let allowed: Vec<&str> = context.allowed_methods().iter().map(Method::as_str).collect();
            Ok(Reply::from(json!({ "allowed": allowed })))
        }
        let mut router = Router::default();
        router
            .get("/route", ok_get)
            .patch("/route", ok_get)
            .unknown(allow_list);

        let result = dispatch(&router, EventBuilder::v1("DELETE", "/route").build()).await;
        assert_eq!(body(&result), json!({"allowed": ["GET", "PATCH"]}));

        let result = dispatch(&router, EventBuilder::v1("DELETE", "/missing").build()).await;
        assert_eq!(body(&result), json!({"allowed": []}));
    }

    #[tokio::test]
    async fn test_resolves_every_event_shape() {
        let mut router = Router::default();
        router.patch("/shape", ok_get);

        for event in [
            EventBuilder::v1("PATCH", "/shape"),
            EventBuilder::v2("PATCH", "/shape"),
            EventBuilder::resource_path("PATCH", "/shape"),
            EventBuilder::empty().field("httpMethod", "PATCH").field(
                "requestContext",
                json!({"path": "/shape"}),
            ),
        ] {
            let result = dispatch(&router, event.build()).await;
            assert_eq!(result.response.status_code, 200);
        }
    }

    #[tokio::test]
    async fn test_overrides_take_precedence() {
        let mut router = Router::default();
        router.delete("/override", ok_get);

        let result = router
            .route_to(
                EventBuilder::v1("GET", "/original").build(),
                Context::new(),
                Some("/override"),
                Some("DELETE"),
            )
            .await
            .unwrap();
        assert_eq!(result.response.status_code, 200);
        assert_eq!(result.uri, "/override");
    }

    #[tokio::test]
    async fn test_missing_method_or_path_is_a_routing_error() {
        let router = Router::default();
        let err = router
            .route(EventBuilder::empty().field("path", "/x").build(), Context::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Routing("Unable to determine httpMethod".to_string())
        );

        let err = router
            .route(EventBuilder::empty().field("httpMethod", "GET").build(), Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Routing(_)));
    }

    #[tokio::test]
    async fn test_context_with_capability_is_rejected() {
        let router = Router::default();
        let mut context = Context::new();
        context.attach_response().unwrap();

        let err = router
            .route(EventBuilder::v1("GET", "/").build(), context)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(msg) if msg.contains("context.response")));
    }

    #[tokio::test]
    async fn test_trailing_slash_is_trimmed() {
        let mut router = Router::default();
        router.get("/route", ok_get);

        let result = dispatch(&router, EventBuilder::v1("GET", "/route/").build()).await;
        assert_eq!(result.response.status_code, 200);
        assert_eq!(result.uri, "/route");

        let mut strict = Router::new(RouterConfig {
            trim_trailing_slash: false,
            ..RouterConfig::default()
        });
        strict.get("/route", ok_get);
        let result = dispatch(&strict, EventBuilder::v1("GET", "/route/").build()).await;
        assert_eq!(result.response.status_code, 404);
    }

    #[tokio::test]
    async fn test_path_parameters_decoded() {
        let mut router = Router::default();
        router.get("/users/{name}", EchoHandler::default());

        let event = EventBuilder::v1("GET", "/users/tim%20kye")
            .path_parameter("name", "tim%20kye")
            .query_parameter("city", "new%20york")
            .build();
        let result = dispatch(&router, event).await;
        let echoed = body(&result);
        assert_eq!(echoed["pathParameters"]["name"], "tim kye");
        assert_eq!(echoed["queryStringParameters"]["city"], "new york");
    }

    #[tokio::test]
    async fn test_empty_query_values_reach_the_handler() {
        let mut router = Router::default();
        router.get("/echo", EchoHandler::default());

        let event = EventBuilder::v1("GET", "/echo")
            .query_parameter("flag", "")
            .query_parameter("q", "x")
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(
            body(&result)["queryStringParameters"],
            json!({"flag": "", "q": "x"})
        );
    }

    #[tokio::test]
    async fn test_multi_value_query_parameters_decoded() {
        let mut router = Router::default();
        router.get("/search", EchoHandler::default());

        let event = EventBuilder::v1("GET", "/search")
            .query_parameter("q", "a%20b")
            .field("multiValueQueryStringParameters", json!({"q": ["a%20b", "c"]}))
            .build();
        let result = dispatch(&router, event).await;
        let echoed = body(&result);
        assert_eq!(echoed["queryStringParameters"]["q"], "a b");
        assert_eq!(echoed["multiValueQueryStringParameters"]["q"], json!(["a b", "c"]));
    }

    #[tokio::test]
    async fn test_path_parameters_left_encoded_without_decoding() {
        let mut router = Router::new(RouterConfig {
            decode_event: false,
            ..RouterConfig::default()
        });
        router.get("/users", EchoHandler::default());

        let event = EventBuilder::v1("GET", "/users")
            .path_parameter("name", "tim%20kye")
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(body(&result)["pathParameters"]["name"], "tim%20kye");
    }

    #[tokio::test]
    async fn test_malformed_encoding_is_a_400() {
        let mut router = Router::default();
        router.get("/users", EchoHandler::default());

        let event = EventBuilder::v1("GET", "/users")
            .query_parameter("q", "100%")
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(result.response.status_code, 400);
        assert_eq!(body(&result), json!({"message": "Malformed request"}));
        assert!(result.response.header(TRACE_ID_RESPONSE_HEADER).is_none());
        assert_eq!(result.endpoint.as_deref(), Some("/users"));
    }

    #[tokio::test]
    async fn test_json_body_is_parsed() {
        let mut router = Router::default();
        router.post("/items", EchoHandler::default());

        let event = EventBuilder::v1("POST", "/items")
            .json_body(&json!({"name": "widget"}))
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(body(&result)["body"], json!({"name": "widget"}));
    }

    #[tokio::test]
    async fn test_form_body_is_parsed() {
        let mut router = Router::default();
        router.post("/form", EchoHandler::default());

        let event = EventBuilder::v1("POST", "/form")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .body("name=tim&city=new+york")
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(
            body(&result)["body"],
            json!({"name": "tim", "city": "new york"})
        );
    }

    #[tokio::test]
    async fn test_body_without_content_type_respects_assume_json() {
        let raw = r#"{"name":"widget"}"#;

        let mut router = Router::default();
        router.post("/items", EchoHandler::default());
        let event = EventBuilder::v1("POST", "/items").body(raw).build();
        assert_eq!(body(&dispatch(&router, event.clone()).await)["body"], raw);

        let mut assuming = Router::new(RouterConfig {
            assume_json: true,
            ..RouterConfig::default()
        });
        assuming.post("/items", EchoHandler::default());
        assert_eq!(
            body(&dispatch(&assuming, event).await)["body"],
            json!({"name": "widget"})
        );
    }

    #[tokio::test]
    async fn test_malformed_json_body_skips_middleware_and_handler() {
        let log = CallLog::new();
        let middleware_log = log.clone();
        let mut router = Router::default();
        router
            .before_route(
                move |_event: &mut RouterEvent, _context: &mut Context| -> Result<(), HttpError> {
                    middleware_log.record("middleware");
                    Ok(())
                },
            )
            .post("/items", EchoHandler::new(log.clone()));

        let event = EventBuilder::v1("POST", "/items")
            .header("content-type", "application/json")
            .body("{not json")
            .build();
        let result = dispatch(&router, event).await;
        assert_eq!(result.response.status_code, 400);
        assert_eq!(body(&result)["message"], "Malformed request");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_trace_id_from_every_header_casing() {
        let mut router = Router::default();
        router.get("/trace", ok_get);

        for name in [
            "X-Trace-Id",
            "X-TRACE-ID",
            "x-trace-id",
            "X-Correlation-Id",
            "X-CORRELATION-ID",
            "x-correlation-id",
        ] {
            let event = EventBuilder::v1("GET", "/trace").header(name, "1234").build();
            let result = dispatch(&router, event).await;
            assert_eq!(
                result.response.headers.get("X-Correlation-Id").map(String::as_str),
                Some("1234"),
                "header {}",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_trace_id_from_request_id_then_generated() {
        let mut router = Router::default();
        router.get("/trace", EchoHandler::default());

        let result = router
            .route(
                EventBuilder::v1("GET", "/trace").build(),
                Context::new().with_request_id("aws-1"),
            )
            .await
            .unwrap();
        assert_eq!(result.response.header("x-correlation-id"), Some("aws-1"));
        assert_eq!(body(&result)["traceId"], "aws-1");

        let result = dispatch(&router, EventBuilder::v1("GET", "/trace").build()).await;
        let generated = result.response.header("x-correlation-id").unwrap();
        assert!(!generated.is_empty());
    }

    #[tokio::test]
    async fn test_trace_id_can_be_disabled() {
        let mut router = Router::new(RouterConfig {
            include_trace_id: false,
            ..RouterConfig::default()
        });
        router.get("/trace", ok_get);

        let event = EventBuilder::v1("GET", "/trace").header("x-trace-id", "1234").build();
        let result = dispatch(&router, event).await;
        assert!(result.response.header("x-correlation-id").is_none());
    }

    #[tokio::test]
    async fn test_custom_response_bypasses_wrapping() {
        let mut router = Router::default();
        router.post("/create", created);

        let result = dispatch(&router, EventBuilder::v1("POST", "/create").build()).await;
        assert_eq!(result.response.status_code, 201);
        assert_eq!(result.response.body, "nothing");
        assert_eq!(result.response.header("content-type"), Some("application/json"));
        assert_eq!(
            result.response.header("access-control-allow-origin"),
            Some("*")
        );
        assert_eq!(result.response.is_base64_encoded, None);
    }

    #[tokio::test]
    async fn test_custom_response_headers_override_defaults() {
        async fn html(_event: RouterEvent, context: Context) -> HandlerResult {
            Ok(context.response(
                CustomResponse::new(200)
                    .with_body("<p>hi</p>")
                    .with_header("Content-Type", "text/html")
                    .base64_encoded(),
            ))
        }
        let mut router = Router::default();
        router.get("/page", html);

        let result = dispatch(&router, EventBuilder::v1("GET", "/page").build()).await;
        assert_eq!(result.response.header("content-type"), Some("text/html"));
        assert_eq!(
            result
                .response
                .headers
                .keys()
                .filter(|name| name.eq_ignore_ascii_case("content-type"))
                .count(),
            1
        );
        assert_eq!(result.response.is_base64_encoded, Some(true));
    }

    #[tokio::test]
    async fn test_set_header_adds_single_header() {
        async fn tagged(_event: RouterEvent, context: Context) -> HandlerResult {
            context.set_header("x-tag", "blue");
            Ok(Reply::from(json!({"ok": true})))
        }
        let mut router = Router::default();
        router.get("/tagged", tagged);

        let result = dispatch(&router, EventBuilder::v1("GET", "/tagged").build()).await;
        assert_eq!(result.response.status_code, 200);
        assert_eq!(result.response.header("x-tag"), Some("blue"));
    }

    #[tokio::test]
    async fn test_empty_reply_has_empty_body() {
        async fn nothing(_event: RouterEvent, _context: Context) -> HandlerResult {
            Ok(Reply::Empty)
        }
        let mut router = Router::default();
        router.delete("/items/{id}", nothing);

        let result = dispatch(&router, EventBuilder::v1("DELETE", "/items/1").build()).await;
        assert_eq!(result.response.status_code, 200);
        assert_eq!(result.response.body, "");
    }

    #[tokio::test]
    async fn test_error_without_formatter() {
        let mut router = Router::default();
        router.get("/fail", fails);

        let result = dispatch(&router, EventBuilder::v1("GET", "/fail").build()).await;
        assert_eq!(result.response.status_code, 500);
        let body = body(&result);
        assert_eq!(body["message"], "boom");
        assert_eq!(body["name"], "Error");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_error_formatter_rewrites_body() {
        let mut router = Router::default();
        router.get("/fail", fails).format_error(|status, mut body| {
            body["customProp"] = json!("formatted");
            body["status"] = json!(status);
            body
        });

        let result = dispatch(&router, EventBuilder::v1("GET", "/fail").build()).await;
        let body = body(&result);
        assert_eq!(body["message"], "boom");
        assert_eq!(body["customProp"], "formatted");
        assert_eq!(body["status"], 500);
    }

    #[tokio::test]
    async fn test_error_fields_headers_and_stack() {
        async fn conflict(_event: RouterEvent, _context: Context) -> HandlerResult {
            Err(HttpError::new(409, "exists")
                .with_name("ConflictError")
                .with_extra("itemId", "abc")
                .with_header("Retry-After", "5")
                .with_stack("at conflict"))
        }
        let mut router = Router::new(RouterConfig {
            include_error_stack: true,
            cors: Cors::Disabled,
            ..RouterConfig::default()
        });
        router.put("/items", conflict);

        let result = dispatch(&router, EventBuilder::v1("PUT", "/items").build()).await;
        assert_eq!(result.response.status_code, 409);
        assert_eq!(result.response.header("retry-after"), Some("5"));
        assert!(result.response.header("access-control-allow-origin").is_none());
        assert_eq!(
            body(&result),
            json!({
                "itemId": "abc",
                "message": "exists",
                "name": "ConflictError",
                "stack": "at conflict"
            })
        );
    }

    #[tokio::test]
    async fn test_anyhow_errors_become_500() {
        async fn database(_event: RouterEvent, _context: Context) -> HandlerResult {
            let result: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
            result?;
            Ok(Reply::Empty)
        }
        let mut router = Router::default();
        router.get("/db", database);

        let result = dispatch(&router, EventBuilder::v1("GET", "/db").build()).await;
        assert_eq!(result.response.status_code, 500);
        assert_eq!(body(&result)["message"], "connection refused");
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order_before_handler() {
        let log = CallLog::new();
        let (first, second) = (log.clone(), log.clone());
        let mut router = Router::default();
        router
            .before_route(
                move |event: &mut RouterEvent, _context: &mut Context| -> Result<(), HttpError> {
                    first.record("first");
                    event.headers.insert("x-user".to_string(), "tim".to_string());
                    Ok(())
                },
            )
            .before_route(
                move |_event: &mut RouterEvent, _context: &mut Context| -> Result<(), HttpError> {
                    second.record("second");
                    Ok(())
                },
            )
            .get("/me", EchoHandler::new(log.clone()));

        let result = dispatch(&router, EventBuilder::v1("GET", "/me").build()).await;
        assert_eq!(body(&result)["headers"]["x-user"], "tim");
        assert_eq!(log.entries(), vec!["first", "second", "start:/me", "end:/me"]);
    }

    #[tokio::test]
    async fn test_middleware_error_aborts_chain() {
        let log = CallLog::new();
        let later = log.clone();
        let mut router = Router::default();
        router
            .before_route(
                |_event: &mut RouterEvent, _context: &mut Context| -> Result<(), HttpError> {
                    Err(HttpError::new(401, "Unauthorized").with_name("AuthError"))
                },
            )
            .before_route(
                move |_event: &mut RouterEvent, _context: &mut Context| -> Result<(), HttpError> {
                    later.record("second");
                    Ok(())
                },
            )
            .get("/me", EchoHandler::new(log.clone()))
            .format_error(|_status, mut body| {
                body["formatted"] = json!(true);
                body
            });

        let result = dispatch(&router, EventBuilder::v1("GET", "/me").build()).await;
        assert_eq!(result.response.status_code, 401);
        assert_eq!(
            body(&result),
            json!({"message": "Unauthorized", "name": "AuthError", "formatted": true})
        );
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_headers_normalized_with_raw_kept() {
        async fn inspect(event: RouterEvent, _context: Context) -> HandlerResult {
            Ok(Reply::from(json!({
                "normalized": event.headers.get("x-api-key"),
                "raw": event.raw_headers.get("X-Api-Key"),
            })))
        }
        let mut router = Router::default();
        router.get("/headers", inspect);

        let event = EventBuilder::v1("GET", "/headers").header("X-Api-Key", "k").build();
        let result = dispatch(&router, event).await;
        assert_eq!(body(&result), json!({"normalized": "k", "raw": "k"}));

        let mut legacy = Router::new(RouterConfig {
            normalize_headers: false,
            ..RouterConfig::default()
        });
        legacy.get("/headers", inspect);
        let event = EventBuilder::v1("GET", "/headers").header("X-Api-Key", "k").build();
        let result = dispatch(&legacy, event).await;
        assert_eq!(body(&result), json!({"normalized": null, "raw": "k"}));
    }

    #[tokio::test]
    async fn test_routes_listed_in_registration_order() {
        let mut router = Router::default();
        router
            .get("/a", ok_get)
            .post("/b", ok_get)
            .batch("/batch", BatchConfig::default());
        let routes: Vec<(Method, String)> = router
            .routes()
            .map(|(method, path)| (method.clone(), path.to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (Method::GET, "/a".to_string()),
                (Method::POST, "/b".to_string()),
                (Method::POST, "/batch".to_string()),
            ]
        );
    }
}
