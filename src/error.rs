// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Every eligibility, validation and storage failure flows through here.
/// No variant ever carries the answer key or a computed score.
#[derive(Debug)]
pub enum AppError {
    // 401 Unauthorized
    AuthRequired(String),

    // 403 Forbidden (non-admin on an admin route)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 403 Quiz switched off by an administrator
    Inactive,

    // 403 Quiz window has not opened yet
    NotStarted { available_from: DateTime<Utc> },

    // 403 Quiz window has closed
    Ended,

    // 403 Caller is not on the linked event's registration list
    NotRegistered,

    // 409 Conflict: a response for (quiz, email) already exists
    AlreadySubmitted,

    // 400 Bad Request
    InvalidInput(String),

    // 500 Internal Server Error (the only retryable class)
    StorageFailure(String),

    // 500 Internal Server Error (clock, token encoding)
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable kind, sent as `code` in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthRequired(_) => "auth_required",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Inactive => "inactive",
            AppError::NotStarted { .. } => "not_started",
            AppError::Ended => "ended",
            AppError::NotRegistered => "not_registered",
            AppError::AlreadySubmitted => "already_submitted",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::StorageFailure(_) => "storage_failure",
            AppError::InternalServerError(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_)
            | AppError::Inactive
            | AppError::NotStarted { .. }
            | AppError::Ended
            | AppError::NotRegistered => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadySubmitted => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StorageFailure(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AuthRequired(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidInput(msg) => write!(f, "{}", msg),
            AppError::Inactive => write!(f, "This quiz is no longer available"),
            AppError::NotStarted { available_from } => {
                write!(f, "This quiz is not available until {}", available_from.to_rfc3339())
            }
            AppError::Ended => write!(f, "This quiz has ended"),
            AppError::NotRegistered => {
                write!(f, "You must be registered for this event to take the quiz")
            }
            AppError::AlreadySubmitted => write!(f, "You have already submitted this quiz"),
            AppError::StorageFailure(_) | AppError::InternalServerError(_) => {
                write!(f, "Internal Server Error")
            }
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::StorageFailure(detail) => tracing::error!("Storage failure: {}", detail),
            AppError::InternalServerError(detail) => {
                tracing::error!("Internal Server Error: {}", detail)
            }
            _ => {}
        }

        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let AppError::NotStarted { available_from } = &self {
            body["available_from"] = json!(available_from);
        }

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::StorageFailure`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
