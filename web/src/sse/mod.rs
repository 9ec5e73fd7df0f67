//! SSE HTTP plumbing for the web layer.
//!
//! The local order feed handler lives here, alongside the response headers
//! both order streams share. The registry itself lives in the `sse` crate.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};

pub mod handler;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Headers every event stream carries on top of its content type.
///
/// `X-Accel-Buffering: no` keeps reverse proxies from holding frames back.
fn stream_headers() -> [(HeaderName, &'static str); 3] {
    [
        (CACHE_CONTROL, "no-cache, no-transform"),
        (CONNECTION, "keep-alive"),
        (X_ACCEL_BUFFERING, "no"),
    ]
}

/// Wraps an already SSE-framed body, such as a relayed upstream stream.
pub(crate) fn event_stream_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/event-stream")],
        stream_headers(),
        body,
    )
        .into_response()
}

/// Adds the shared stream headers to an `Sse` (or any other) response.
pub(crate) fn with_stream_headers(response: impl IntoResponse) -> Response {
    (stream_headers(), response).into_response()
}
