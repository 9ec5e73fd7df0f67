use crate::controller::{health_check_controller, order_controller, order_stream_controller};
use crate::sse::handler;
use crate::AppState;
use axum::{
    routing::{get, post, put},
    Json, Router,
};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Order Relay API"
        ),
        paths(
            health_check_controller::health_check,
            order_controller::create,
            order_controller::update_status,
            order_stream_controller::relay,
            handler::sse_handler,
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "order_relay", description = "Live order notifications for the browser")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines the session cookie the relay reads to authenticate callers against the backend.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "cookie_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "access_token",
                "Backend access token; an expired one is refreshed from the refresh_token cookie",
            ))),
        )
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(order_routes(app_state.clone()))
        .merge(order_feed_routes(app_state))
        .route("/api-docs/openapi.json", get(openapi_json))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn order_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/orders", post(order_controller::create))
        .route("/orders/{id}/status", put(order_controller::update_status))
        .with_state(app_state)
}

fn order_feed_routes(app_state: AppState) -> Router {
    Router::new()
        // Authoritative backend stream, relayed per connection
        .route("/orders/stream", get(order_stream_controller::relay))
        // Notifications for mutations made through this service
        .route("/orders/events", get(handler::sse_handler))
        .with_state(app_state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request, test_app_state};
    use axum::http::StatusCode;
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_openapi_document_lists_order_routes() {
        let router = define_routes(test_app_state("http://127.0.0.1:1".to_string()));

        let response = router
            .oneshot(request("GET", "/api-docs/openapi.json", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        for path in [
            "/health",
            "/orders",
            "/orders/{id}/status",
            "/orders/stream",
            "/orders/events",
        ] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
        assert!(doc["components"]["securitySchemes"]["cookie_auth"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let router = define_routes(test_app_state("http://127.0.0.1:1".to_string()));

        let response = router
            .oneshot(request("GET", "/orders/unknown/thing", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
