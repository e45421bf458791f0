//! HTTP response building helpers
//!
//! Every response built here carries the permissive CORS headers, and every
//! error body has the shape `{"detail": <message>, "code": <code>}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::ArenaError;

/// Build a response with body, status and content type
pub fn body_response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    with_cors(response)
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => body_response(status, "application/json", json),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            body_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                r#"{"detail":"Failed to serialize response","code":"INTERNAL_ERROR"}"#,
            )
        }
    }
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    with_cors(response)
}

/// Build a text/markdown response
pub fn markdown(body: String) -> Response<Full<Bytes>> {
    body_response(StatusCode::OK, "text/markdown; charset=utf-8", body)
}

fn detail_response(status: StatusCode, code: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "detail": message, "code": code }))
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    detail_response(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    detail_response(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed")
}

/// HTTP status for an error
pub fn status_for(error: &ArenaError) -> StatusCode {
    match error {
        ArenaError::NotFound(_) => StatusCode::NOT_FOUND,
        ArenaError::Conflict(_) | ArenaError::StateConflict(_) => StatusCode::CONFLICT,
        ArenaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ArenaError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an ArenaError to an appropriate HTTP response
pub fn error_response(error: ArenaError) -> Response<Full<Bytes>> {
    let status = status_for(&error);

    if error.is_client_error() {
        debug!(status = %status, error = %error, "Request rejected");
        detail_response(status, error.code(), &error.to_string())
    } else {
        error!(error = %error, "Request failed");
        detail_response(status, error.code(), "Internal server error")
    }
}

/// Permissive CORS headers on every response
pub fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PATCH, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-API-Key"),
    );
    response
}

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, ArenaError>;

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, ArenaError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into an HTTP response with 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, ArenaError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_ok_response() {
        let resp = ok(&serde_json::json!({"test": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(status_for(&ArenaError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&ArenaError::StateConflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&ArenaError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&ArenaError::Validation("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&ArenaError::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let resp = error_response(ArenaError::StateConflict("Prompt is closed.".into()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_json(resp).await;
        assert_eq!(body["detail"], "Prompt is closed.");
        assert_eq!(body["code"], "STATE_CONFLICT");
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let resp = error_response(ArenaError::Internal("disk path /secret".into()));
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["detail"], "Internal server error");
    }
}
