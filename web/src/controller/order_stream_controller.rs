use crate::extractors::session_cookies::SessionCookieJar;
use crate::sse::event_stream_response;
use crate::{AppState, Error};
use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use domain::{BackendClient, RelaySession, SessionCookieCredentials};
use log::*;

/// GET the backend's live order stream
///
/// Relays the backend's order stream to the browser byte for byte. Each
/// connection opens its own upstream stream, which is closed as soon as the
/// browser disconnects or the server shuts down.
#[utoipa::path(
    get,
    path = "/orders/stream",
    responses(
        (status = 200, description = "Backend order stream, relayed unchanged", content_type = "text/event-stream", body = String),
        (status = 401, description = "Unauthenticated"),
        (status = 502, description = "Backend unreachable"),
        (status = "default", description = "Backend refused the stream; its status is passed through"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn relay(
    SessionCookieJar(cookies): SessionCookieJar,
    State(app_state): State<AppState>,
) -> Result<Response, Error> {
    let backend = BackendClient::new(&app_state.config, app_state.http_client.clone());
    let credentials = SessionCookieCredentials::new(backend.clone());

    let session = RelaySession::new(&app_state.shutdown);
    debug!("Opening order relay session {}", session.id());

    let stream = session.open(&credentials, &backend, &cookies).await?;

    Ok(event_stream_response(Body::from_stream(stream)))
}
