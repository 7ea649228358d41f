//! Error response normalization middleware
//!
//! Framework rejections (malformed JSON, wrong content type, unknown method)
//! come back as text/plain with parser details. They are rewritten to the
//! same `{error, message}` body `AppError` produces.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Rewrite every non-JSON 4xx/5xx response to the JSON error body
pub async fn normalize_error_response(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        return response;
    }

    tracing::debug!(status = status.as_u16(), "Normalizing framework error response");
    generic_error_response(status)
}

fn generic_error_response(status: StatusCode) -> Response {
    let (error, message) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", "Invalid request body"),
        StatusCode::UNAUTHORIZED => ("unauthorized", "Authentication required"),
        StatusCode::FORBIDDEN => ("forbidden", "Access denied"),
        StatusCode::NOT_FOUND => ("not_found", "Not found"),
        StatusCode::METHOD_NOT_ALLOWED => ("method_not_allowed", "Method not allowed"),
        StatusCode::REQUEST_TIMEOUT => ("timeout", "Request timed out"),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ("unsupported_media_type", "Unsupported content type"),
        StatusCode::UNPROCESSABLE_ENTITY => ("validation", "Validation error"),
        _ if status.is_client_error() => ("client_error", "Client error"),
        _ => ("internal_error", "An internal error occurred"),
    };

    (status, axum::Json(json!({ "error": error, "message": message }))).into_response()
}
