//! Request ID middleware.
//!
//! Reuses the caller's `X-Request-ID` header when it is a usable header
//! value, otherwise generates a UUID v4. The id is stored in the request
//! extensions for the logging and error middleware and echoed back in the
//! response headers.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied id that is accepted as is.
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, body::Body, middleware, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|Extension(id): Extension<RequestId>| async move { id.0 }))
            .layer(middleware::from_fn(request_id_middleware))
    }

    async fn call(request: Request) -> (String, String) {
        let response = app().oneshot(request).await.unwrap();
        let header = response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_propagates_caller_id() {
        let request = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "trace-123")
            .body(Body::empty())
            .unwrap();

        let (header, seen_by_handler) = call(request).await;
        assert_eq!(header, "trace-123");
        assert_eq!(seen_by_handler, "trace-123");
    }

    #[tokio::test]
    async fn test_generates_id_when_missing_or_oversized() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (header, seen_by_handler) = call(request).await;
        assert!(Uuid::parse_str(&header).is_ok());
        assert_eq!(header, seen_by_handler);

        let request = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "x".repeat(MAX_REQUEST_ID_LEN + 1))
            .body(Body::empty())
            .unwrap();
        let (header, _) = call(request).await;
        assert!(Uuid::parse_str(&header).is_ok());
    }
}
