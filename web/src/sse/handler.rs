use crate::extractors::authorized_caller::AuthorizedCaller;
use crate::sse::with_stream_headers;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use log::*;
use service::AppState;
use std::convert::Infallible;

/// GET the local order feed
///
/// Streams the order notifications this process observed. The subscription is
/// released as soon as the browser goes away or the server shuts down.
#[utoipa::path(
    get,
    path = "/orders/events",
    responses(
        (status = 200, description = "Live order notifications observed by this service", content_type = "text/event-stream", body = String),
        (status = 401, description = "Unauthenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn sse_handler(
    _caller: AuthorizedCaller,
    State(app_state): State<AppState>,
) -> Response {
    let mut subscription = app_state.sse_manager.subscribe();
    let connection_id = subscription.connection_id().as_str().to_string();
    debug!("Establishing order feed connection {connection_id}");

    // Events arrive from the subscription; it unregisters itself when this
    // stream is dropped.
    let stream = stream! {
        while let Some(event) = subscription.recv().await {
            yield Ok::<Event, Infallible>(event);
        }

        debug!("Order feed connection {connection_id} closed");
    };

    let keep_alive = KeepAlive::new()
        .interval(app_state.config.sse_keep_alive())
        .text("keep-alive");

    with_stream_headers(Sse::new(stream).keep_alive(keep_alive))
}
