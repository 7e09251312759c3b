//! HTTP error responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::Error;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("directory unavailable: {0}")]
    Directory(String),
    #[error("matching timed out after {0}s")]
    Timeout(u64),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Directory(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidQuery(_) => "invalid_query",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::Directory(_) => "directory_unavailable",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to callers. Server-side details stay in the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::InvalidQuery(msg) => msg.clone(),
            ApiError::ModelUnavailable(_) => "skill matching is temporarily unavailable".to_string(),
            ApiError::Directory(_) => "user directory is unavailable".to_string(),
            ApiError::Timeout(secs) => format!("matching did not finish within {secs}s"),
            ApiError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidQuery(msg) => ApiError::InvalidQuery(msg),
            Error::ModelUnavailable(msg) => ApiError::ModelUnavailable(msg),
            Error::Directory(msg) => ApiError::Directory(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();

        if status.is_server_error() {
            error!(code, status = %status, error = %self, "api_error");
        } else {
            warn!(code, status = %status, error = %self, "api_error");
        }

        let body = Json(ErrorResponse {
            code,
            message: self.public_message(),
        });

        (status, body).into_response()
    }
}
