use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::BackendResponse;

pub(crate) mod health_check_controller;
pub(crate) mod order_controller;
pub(crate) mod order_stream_controller;

/// Hands a backend response back to the caller with its status, content type and body intact.
fn passthrough(response: BackendResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .content_type
        .unwrap_or_else(|| "application/json".to_string());

    (status, [(CONTENT_TYPE, content_type)], response.body).into_response()
}
