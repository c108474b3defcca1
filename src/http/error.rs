//! HTTP error responses.
//!
//! Every error body is `{"error": "<message>"}`. Server-side failures never
//! leak their cause to the client; it is logged instead.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::gate::Rejection;
use crate::store::StoreError;

/// Error type returned by handlers and middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Unauthorized(_) => "Unauthorized".to_string(),
            ApiError::Forbidden => "Forbidden".to_string(),
            ApiError::NotFound => "Not found".to_string(),
            ApiError::RateLimited { retry_after_secs } => {
                format!("rate limit exceeded, retry after: {}s", retry_after_secs)
            }
            ApiError::Internal(_) => "The server encountered a problem".to_string(),
        }
    }
}

/// Response for a handler that panicked. The payload is logged, never returned.
pub fn panic_response(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::RateLimited { retry_after_secs } => ApiError::RateLimited { retry_after_secs },
            Rejection::Unauthorized(err) => ApiError::Unauthorized(err.to_string()),
            Rejection::Forbidden => ApiError::Forbidden,
            Rejection::Misconfigured(msg) | Rejection::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Conflict => ApiError::Conflict("resource already exists".to_string()),
            StoreError::DuplicateEmail => ApiError::Conflict("Email already exists".to_string()),
            StoreError::DuplicateUsername => ApiError::Conflict("Username already exists".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ApiError::Internal(cause) = &self {
            tracing::error!(status = %status, error = %cause, "Server error occurred");
        }

        let mut response = (status, Json(json!({ "error": self.public_message() }))).into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn test_rejection_status_codes() {
        let cases = [
            (Rejection::RateLimited { retry_after_secs: 3 }, StatusCode::TOO_MANY_REQUESTS),
            (Rejection::Unauthorized(AuthError::Expired), StatusCode::UNAUTHORIZED),
            (Rejection::Forbidden, StatusCode::FORBIDDEN),
            (Rejection::Misconfigured("role".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Rejection::Internal("db".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (rejection, status) in cases {
            assert_eq!(ApiError::from(rejection).status_code(), status);
        }
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::RateLimited { retry_after_secs: 4 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "4");
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(ApiError::from(StoreError::NotFound), ApiError::NotFound);
        assert_eq!(ApiError::from(StoreError::Timeout).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::from(StoreError::Conflict).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(StoreError::DuplicateEmail),
            ApiError::Conflict("Email already exists".into())
        );
    }

    #[test]
    fn test_internal_cause_is_hidden() {
        let err = ApiError::Internal("connection refused to 10.0.0.3".into());
        assert_eq!(err.public_message(), "The server encountered a problem");
    }

    #[test]
    fn test_panic_payload_is_hidden() {
        let response = panic_response(Box::new("secret detail"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
