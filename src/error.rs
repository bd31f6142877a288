use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::limits::BytesPerSecond;

/// Rate-violation condition for hosts that reject instead of throttle.
///
/// Carries the offending endpoint and its configured limit. The throttling
/// path never raises it; [`BandwidthLimiter::check`](crate::limits::BandwidthLimiter::check)
/// and the `Reject` enforcement mode do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Endpoint {endpoint} is limited to {limit} bytes/second")]
pub struct BandwidthLimitExceeded {
    pub endpoint: String,
    pub limit: BytesPerSecond,
}

impl BandwidthLimitExceeded {
    pub fn new(endpoint: impl Into<String>, limit: BytesPerSecond) -> Self {
        Self {
            endpoint: endpoint.into(),
            limit,
        }
    }
}

/// Application-wide error types with appropriate HTTP status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    BandwidthLimitExceeded(#[from] BandwidthLimitExceeded),

    #[error("Invalid bandwidth limit: {0}")]
    InvalidLimit(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            endpoint: None,
            limit: None,
        }
    }
}

impl IntoResponse for BandwidthLimitExceeded {
    fn into_response(self) -> Response {
        tracing::warn!(
            endpoint = %self.endpoint,
            limit = self.limit.get(),
            "Bandwidth limit exceeded"
        );

        let body = ErrorResponse {
            error: "bandwidth_limit_exceeded".to_string(),
            message: self.to_string(),
            endpoint: Some(self.endpoint),
            limit: Some(self.limit.get()),
        };

        (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BandwidthLimitExceeded(exceeded) => return exceeded.into_response(),

            // Client errors - the message is user-facing
            AppError::InvalidLimit(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_limit", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new("not_found", msg)),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", msg),
            ),
            AppError::SerializationError(e) => {
                tracing::debug!(error = %e, "Rejected malformed request body");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("serialization_error", "Malformed JSON in request body"),
                )
            }

            // Internal errors - never expose details to clients
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "internal_error",
                        "An internal error occurred. Please contact support if the issue persists.",
                    ),
                )
            }
            AppError::ConfigError(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "config_error",
                        "Service configuration error. Please contact support.",
                    ),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use axum::body::to_bytes;

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_limit_exceeded_message() {
        let err = BandwidthLimitExceeded::new("get_data", BytesPerSecond::new(100).unwrap());
        assert_eq!(
            err.to_string(),
            "Endpoint get_data is limited to 100 bytes/second"
        );
    }

    #[tokio::test]
    async fn test_limit_exceeded_renders_429_with_endpoint_and_limit() {
        let err = BandwidthLimitExceeded::new("slow", BytesPerSecond::new(50).unwrap());
        let response = AppError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = json_body(response).await;
        assert_eq!(body["error"], "bandwidth_limit_exceeded");
        assert_eq!(body["endpoint"], "slow");
        assert_eq!(body["limit"], 50);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::Internal("db password leaked".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(!body["message"].as_str().unwrap().contains("password"));
        assert!(body.get("endpoint").is_none());
    }

    #[tokio::test]
    async fn test_invalid_limit_is_bad_request() {
        let response = AppError::InvalidLimit("rate must be positive".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
