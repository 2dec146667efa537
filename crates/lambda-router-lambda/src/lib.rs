//! AWS Lambda adapter for `lambda-router`.
//!
//! Builds the route table once per cold start and hands every invocation's
//! payload to [`Router::route`], returning the proxy response to API Gateway.

pub mod routes;

use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{debug, info};

use lambda_router::{
    BatchConfig, Context, HttpError, ProxyResponse, Router, RouterConfig, RouterEvent,
    AWS_REQUEST_ID,
};

/// Path of the batch endpoint.
pub const BATCH_PATH: &str = "/batch";

/// Caller context property holding the function ARN.
pub const INVOKED_FUNCTION_ARN: &str = "invokedFunctionArn";

/// Assemble the route table served by this function.
pub fn build_router(config: RouterConfig) -> Router {
    let mut router = Router::new(config);
    router
        .before_route(log_request)
        .get("/health", routes::health)
        .get("/items/{id}", routes::get_item)
        .post("/items", routes::create_item)
        .delete("/items/{id}", routes::delete_item)
        .batch(BATCH_PATH, BatchConfig::default());
    router
}

fn log_request(event: &mut RouterEvent, context: &mut Context) -> Result<(), HttpError> {
    debug!(
        method = %event.http_method,
        path = %event.path,
        batch_request_id = context.batch_request_id(),
        "routing request"
    );
    Ok(())
}

/// Map a Lambda invocation onto the router.
///
/// Only router misuse (an undeterminable method or path) fails the
/// invocation; everything else is answered with a proxy response.
pub async fn handler(router: &Router, event: LambdaEvent<Value>) -> Result<ProxyResponse, Error> {
    let LambdaEvent { payload, context } = event;
    let request_id = context.request_id.clone();

    let router_context = Context::new()
        .with_request_id(request_id.clone())
        .with_property(AWS_REQUEST_ID, request_id.clone())
        .with_property(INVOKED_FUNCTION_ARN, context.invoked_function_arn.clone());

    let result = router.route(payload, router_context).await?;
    info!(
        request_id = %request_id,
        endpoint = result.endpoint.as_deref(),
        uri = %result.uri,
        status = result.response.status_code,
        "request complete"
    );

    Ok(result.response)
}
