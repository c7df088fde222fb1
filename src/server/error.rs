use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::error::AppError;

/// Errors returned by HTTP handlers. Bodies are the plain error text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            AppError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(msg) => {
                tracing::debug!(target: "http", error = %msg, "Bad request");
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(msg) => {
                tracing::debug!(target: "http", error = %msg, "Not found");
                StatusCode::NOT_FOUND
            }
            ApiError::Internal(msg) => {
                tracing::error!(target: "http", error = %msg, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
