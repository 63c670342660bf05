// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid or expired refresh token")]
    InvalidToken,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Notification delivery failed: {0}")]
    Notifier(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Authentication(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Notifier(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, message) = match &self {
            AppError::Validation(msg) => ("validation_error", Some(msg.clone())),
            AppError::Authentication(msg) => ("authentication_error", Some(msg.clone())),
            AppError::InvalidToken => ("authentication_error", Some(self.to_string())),
            AppError::Unauthorized => (
                "unauthorized",
                Some("Please provide a valid token".to_string()),
            ),
            AppError::Conflict(msg) => ("conflict", Some(msg.clone())),
            AppError::NotFound(msg) => ("not_found", Some(msg.clone())),
            AppError::RateLimited => (
                "too_many_requests",
                Some("Too many requests. Please try again later.".to_string()),
            ),
            AppError::Notifier(msg) => {
                tracing::error!(error = %msg, "Notifier error");
                ("internal_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ("internal_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                ("internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
