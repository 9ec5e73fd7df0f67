//! Order mutations proxied to the backend.
//!
//! The backend response is always returned unchanged; an order notification
//! is published only when the backend accepted the mutation.

use crate::error::Error;
use crate::gateway::backend::{BackendClient, BackendResponse};
use events::{DomainEvent, EventPublisher};
use log::*;
use reqwest::Method;
use serde_json::Value;

/// Create an order on the backend.
pub async fn create(
    backend: &BackendClient,
    publisher: &EventPublisher,
    authorization: &str,
    params: &Value,
) -> Result<BackendResponse, Error> {
    let response = backend
        .forward(Method::POST, "/orders", authorization, Some(params))
        .await?;

    if response.is_success() {
        let order_id = response.json().as_ref().and_then(order_id_from);
        debug!("Order created: {order_id:?}");
        publisher.publish(DomainEvent::order_created(order_id)).await;
    }

    Ok(response)
}

/// Change an order's status on the backend.
pub async fn update_status(
    backend: &BackendClient,
    publisher: &EventPublisher,
    authorization: &str,
    order_id: &str,
    params: &Value,
) -> Result<BackendResponse, Error> {
    if !is_valid_order_id(order_id) {
        warn!("Rejecting status update for malformed order id {order_id:?}");
        return Err(Error::invalid());
    }

    let path = format!("/orders/{order_id}/status");
    let response = backend
        .forward(Method::PUT, &path, authorization, Some(params))
        .await?;

    if response.is_success() {
        let status = params
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!("Order {order_id} status updated to {status:?}");
        publisher
            .publish(DomainEvent::order_status_updated(
                Some(order_id.to_string()),
                status,
            ))
            .await;
    }

    Ok(response)
}

/// Order ids are interpolated into a backend path, so only path-safe ids are accepted.
fn is_valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reads the order id from a backend body, which may or may not wrap it in `data`.
fn order_id_from(body: &Value) -> Option<String> {
    let candidates = [body, body.get("data").unwrap_or(&Value::Null)];
    candidates.iter().find_map(|value| {
        ["id", "_id"]
            .iter()
            .find_map(|key| match value.get(key)? {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
    })
}
