//! Error handler for converting AppError to HTTP responses.
//!
//! Handlers return `AppResult<T>`; the `IntoResponse` impl below turns the
//! error side into a JSON [`ErrorResponse`]. Responses produced outside the
//! handlers (extractor rejections, unknown routes, request timeouts) are
//! rewritten into the same shape by [`global_error_handler`].

use axum::{
    Json,
    body::Bytes,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::RequestId;
use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        let error_response = match &self {
            AppError::NotFound {
                entity,
                field,
                value,
            } => ErrorResponse::not_found_error(entity, field, value),
            AppError::Validation { field, reason } => {
                ErrorResponse::validation_error(field, reason)
            }
            AppError::BadRequest { message } => ErrorResponse::new("BAD_REQUEST", message),
            AppError::Conflict { message } => ErrorResponse::new("CONFLICT", message),
            AppError::Database { operation, .. } => ErrorResponse::new(
                "DATABASE_ERROR",
                &format!("Database operation failed: {operation}"),
            )
            .with_details(json!({ "operation": operation })),
            AppError::Configuration { key, .. } => ErrorResponse::new(
                "CONFIGURATION_ERROR",
                &format!("Configuration error: {key}"),
            )
            .with_details(json!({ "key": key })),
            AppError::ConnectionPool { .. } => {
                ErrorResponse::new("SERVICE_UNAVAILABLE", "Database connection unavailable")
            }
            AppError::Internal { .. } => {
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        (status, Json(error_response)).into_response()
    }
}

/// Maps an AppError variant to its corresponding HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Conflict { .. } => StatusCode::CONFLICT,
        AppError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database { .. } | AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Rewrites plain-text error responses into [`ErrorResponse`] JSON and tags
/// every error body with the request id.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().cloned();
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    let (mut parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, 64 * 1024)
        .await
        .unwrap_or_else(|_| Bytes::new());

    if is_json {
        let Some(RequestId(id)) = &request_id else {
            return Response::from_parts(parts, bytes.into());
        };
        return match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Object(mut fields)) => {
                fields.insert("request_id".to_string(), json!(id));
                parts.headers.remove(header::CONTENT_LENGTH);
                let body = serde_json::to_vec(&fields).unwrap_or_else(|_| bytes.to_vec());
                Response::from_parts(parts, body.into())
            }
            _ => Response::from_parts(parts, bytes.into()),
        };
    }

    let mut error_response = plain_error(status, String::from_utf8_lossy(&bytes).trim());
    if let Some(RequestId(id)) = &request_id {
        error_response = error_response.with_request_id(id);
    }
    (status, Json(error_response)).into_response()
}

fn plain_error(status: StatusCode, original: &str) -> ErrorResponse {
    let code = match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::REQUEST_TIMEOUT => "REQUEST_TIMEOUT",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        s if s.is_server_error() => "INTERNAL_SERVER_ERROR",
        _ => "UNKNOWN_ERROR",
    };
    let message = if original.is_empty() {
        status.canonical_reason().unwrap_or("Request failed")
    } else {
        original
    };
    ErrorResponse::new(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            error_to_status_code(&AppError::not_found("BackupJob", "id", 1)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_to_status_code(&AppError::validation("at", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_to_status_code(&AppError::Conflict {
                message: "busy".to_string()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_to_status_code(&AppError::ConnectionPool {
                source: anyhow::anyhow!("down")
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = AppError::not_found("BackupJob", "id", 42).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["details"]["value"], "42");
    }

    #[tokio::test]
    async fn test_internal_error_hides_source() {
        let response = AppError::Internal {
            source: anyhow::anyhow!("secret detail"),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "An internal error occurred");
        assert!(!body.to_string().contains("secret detail"));
    }

    #[test]
    fn test_plain_error_falls_back_to_reason() {
        let error = plain_error(StatusCode::REQUEST_TIMEOUT, "");
        assert_eq!(error.code, "REQUEST_TIMEOUT");
        assert_eq!(error.message, "Request Timeout");

        let error = plain_error(StatusCode::BAD_REQUEST, "Invalid URL");
        assert_eq!(error.message, "Invalid URL");
    }
}
