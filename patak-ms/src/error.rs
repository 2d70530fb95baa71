//! HTTP error responses
//!
//! Every failure leaves the service as JSON `{"error": "..."}` with a status
//! code chosen from the error kind.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use patak_common::Error;
use serde_json::json;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                error!("Request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("house field required".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("payment x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("settled".into()), StatusCode::CONFLICT),
            (Error::Internal("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = ApiError::from(Error::Validation("house field required".into()));
        assert_eq!(err.to_string(), "house field required");
    }
}
