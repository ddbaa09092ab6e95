//! Router configuration for the API.

use std::time::Duration;

use axum::{Router, http::StatusCode, middleware};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{global_error_handler, logging_middleware, request_id_middleware};
use crate::state::AppState;

/// Builds the application router.
///
/// # Routes
/// - `GET /health`
/// - `POST /api/jobs/{id}/run`, `GET /api/jobs/due`, `GET /api/jobs/{id}/logs`
/// - `/swagger-ui` and `/api-docs/openapi.json`
///
/// # Middleware Order
/// Last added runs first: request id, then logging, then error formatting,
/// then the request timeout closest to the handlers.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(handlers::health::health_routes())
        .nest("/api/jobs", handlers::jobs::job_routes())
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::from_fn(global_error_handler))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::REQUEST_ID_HEADER;
    use crate::state::testing::test_state;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(REQUEST_ID_HEADER, "test-request")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "test-request");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    fn router() -> Router {
        create_router(test_state().state, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_health_route() {
        let (status, body) = send(router(), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_job_run_is_404_json() {
        let (status, body) = send(router(), Method::POST, "/api/jobs/99/run").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["request_id"], "test-request");
    }

    #[tokio::test]
    async fn test_due_jobs_route_validates_timestamp() {
        let (status, body) = send(router(), Method::GET, "/api/jobs/due?at=2024-01-15T02:00:00Z").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_ids"], serde_json::json!([]));

        let (status, body) = send(router(), Method::GET, "/api/jobs/due?at=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_rejections_are_rewritten_as_json() {
        let (status, body) = send(router(), Method::POST, "/api/jobs/abc/run").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["request_id"], "test-request");

        let (status, body) = send(router(), Method::GET, "/api/jobs/1/logs?limit=9999").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "limit");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let (status, body) = send(router(), Method::GET, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().unwrap();
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/api/jobs/{id}/run"));
        assert!(paths.contains_key("/api/jobs/due"));
        assert!(paths.contains_key("/api/jobs/{id}/logs"));
    }
}
