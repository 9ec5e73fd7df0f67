use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET liveness of the relay itself
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Relay is up and responding to requests", body = String),
    )
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}

#[cfg(test)]
mod tests {
    use crate::test_support::{request, test_app_state};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let router = crate::router::define_routes(test_app_state("http://127.0.0.1:1".to_string()));

        let response = router.oneshot(request("GET", "/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"healthy");
    }
}
