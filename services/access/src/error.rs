//! Custom error types for the access service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Error kinds surfaced by the access components
#[derive(Error, Debug)]
pub enum AccessError {
    /// Booking, authorization code or property absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed validity window or request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed device identifier, key or command
    #[error("Format error: {0}")]
    Format(String),

    /// Transport or remote device failure
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Authorization denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Notification could not be enqueued
    #[error("Notification error: {0}")]
    Notification(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AccessError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AccessError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AccessError::Format(msg) => (StatusCode::BAD_REQUEST, msg),
            AccessError::Dispatch(msg) => (StatusCode::BAD_GATEWAY, msg),
            AccessError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AccessError::Notification(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Notification error".to_string(),
            ),
            AccessError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for access results
pub type AccessResult<T> = Result<T, AccessError>;
