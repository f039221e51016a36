use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use healthpulse_common::Error;
use serde::Serialize;
use thiserror::Error as ThisError;
use tracing::{error, warn};

/// What clients see whenever the assistant or a store fails. Rate-limit and
/// unavailability share this payload and differ only by status code.
pub const UNAVAILABLE_MESSAGE: &str = "The assistant is unavailable right now.";

/// Caller-visible API failure. The `Unavailable` and `RateLimited` variants
/// keep the internal detail for server-side logs but never expose it in the
/// response body.
#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::RateLimited(detail) => {
                warn!(detail = %detail, "generation provider rate limited");
                (StatusCode::TOO_MANY_REQUESTS, UNAVAILABLE_MESSAGE.to_string())
            }
            ApiError::Unavailable(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UNAVAILABLE_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::RateLimited(detail) => ApiError::RateLimited(detail),
            Error::Timeout(detail)
            | Error::Provider(detail)
            | Error::Database(detail)
            | Error::Config(detail) => ApiError::Unavailable(detail),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_passes_through_as_429() {
        let err: ApiError = Error::RateLimited("status=429".to_string()).into();
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[test]
    fn provider_and_timeout_collapse_to_unavailable() {
        let provider: ApiError = Error::Provider("status=503".to_string()).into();
        let timeout: ApiError = Error::Timeout("deadline".to_string()).into();
        assert!(matches!(provider, ApiError::Unavailable(_)));
        assert!(matches!(timeout, ApiError::Unavailable(_)));
    }

    #[test]
    fn validation_is_a_client_error() {
        let err: ApiError = Error::Validation("content is required".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
