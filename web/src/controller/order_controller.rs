use crate::controller::passthrough;
use crate::extractors::authorized_caller::AuthorizedCaller;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use domain::{order as OrderApi, BackendClient};
use log::*;
use serde_json::Value;

/// POST create a new Order
///
/// The backend's answer is returned as-is. Live feed subscribers are notified
/// only when the backend accepted the order.
#[utoipa::path(
    post,
    path = "/orders",
    responses(
        (status = 201, description = "Backend created the order"),
        (status = 401, description = "Unauthenticated"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 502, description = "Backend unreachable"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn create(
    AuthorizedCaller(authorization): AuthorizedCaller,
    State(app_state): State<AppState>,
    Json(params): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Create a New Order");

    let backend = BackendClient::new(&app_state.config, app_state.http_client.clone());
    let response =
        OrderApi::create(&backend, &app_state.event_publisher, &authorization, &params).await?;

    Ok(passthrough(response))
}

/// PUT update an Order's status
#[utoipa::path(
    put,
    path = "/orders/{id}/status",
    params(
        ("id" = String, Path, description = "Order id to update"),
    ),
    responses(
        (status = 200, description = "Backend updated the order status"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 502, description = "Backend unreachable"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn update_status(
    AuthorizedCaller(authorization): AuthorizedCaller,
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(params): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT Update status of Order {id}");

    let backend = BackendClient::new(&app_state.config, app_state.http_client.clone());
    let response = OrderApi::update_status(
        &backend,
        &app_state.event_publisher,
        &authorization,
        &id,
        &params,
    )
    .await?;

    Ok(passthrough(response))
}
