//! AWS Lambda function serving the demonstration route table.

use std::sync::Arc;

use lambda_router::{init_logging, LoggingConfig, RouterConfig};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

use lambda_router_lambda::{build_router, handler};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging(&LoggingConfig::from_env())?;

    let router = Arc::new(build_router(RouterConfig::default()));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let router = Arc::clone(&router);
        async move { handler(&router, event).await }
    }))
    .await
}
