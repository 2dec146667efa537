//! Demonstration handlers.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use lambda_router::{Context, CustomResponse, HandlerResult, HttpError, Reply, RouterEvent};

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Item {
    pub id: String,
    pub name: String,
}

pub async fn health(_event: RouterEvent, _context: Context) -> HandlerResult {
    Ok(Reply::from(json!({ "status": "ok" })))
}

pub async fn get_item(event: RouterEvent, _context: Context) -> HandlerResult {
    let id = event
        .path_parameter("id")
        .ok_or_else(|| HttpError::bad_request("id required"))?;
    let item = Item {
        id: id.to_string(),
        name: format!("item-{}", id),
    };
    Ok(Reply::from(serde_json::to_value(item)?))
}

pub async fn create_item(event: RouterEvent, context: Context) -> HandlerResult {
    let new_item: NewItem = event.body_as()?;
    if new_item.name.trim().is_empty() {
        return Err(HttpError::bad_request("name must not be empty").with_name("ValidationError"));
    }

    let id = new_item.name.trim().to_lowercase().replace(' ', "-");
    info!(
        id = %id,
        batch_request_id = context.batch_request_id(),
        "item created"
    );

    let item = Item {
        id: id.clone(),
        name: new_item.name,
    };
    Ok(context.response(
        CustomResponse::new(201)
            .with_body(serde_json::to_value(item)?)
            .with_header("location", format!("/items/{}", id)),
    ))
}

pub async fn delete_item(_event: RouterEvent, context: Context) -> HandlerResult {
    Ok(context.response(CustomResponse::new(204)))
}
