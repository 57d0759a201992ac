//! API error types with IntoResponse
//!
//! Errors are converted to JSON `{error, message}` bodies with matching status
//! codes. Server-side failures are logged and reported generically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::repos::DbError;
use crate::models::ValidationError;
use crate::storage::StorageError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Malformed request body (400)
    BadRequest { message: String },

    /// No valid session (401)
    Unauthorized { reason: &'static str },

    /// Authenticated but not allowed (403)
    Forbidden { reason: String },

    /// Resource not found or not visible to the caller (404)
    NotFound { resource: &'static str, id: String },

    /// Unique constraint hit (409)
    Conflict { message: String },

    /// Request body over the upload cap (413)
    PayloadTooLarge { message: String },

    /// Database error (500, logged)
    Database(DbError),

    /// Blob storage error (500, logged)
    Storage(StorageError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) | Self::Storage(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({
                "error": "validation_error",
                "message": e.to_string()
            }),
            Self::BadRequest { message } => json!({
                "error": "bad_request",
                "message": message
            }),
            Self::Unauthorized { reason } => json!({
                "error": "unauthorized",
                "message": reason
            }),
            Self::Forbidden { reason } => json!({
                "error": "forbidden",
                "message": reason
            }),
            Self::NotFound { resource, id } => json!({
                "error": "not_found",
                "message": format!("{} '{}' not found", resource, id)
            }),
            Self::Conflict { message } => json!({
                "error": "conflict",
                "message": message
            }),
            Self::PayloadTooLarge { message } => json!({
                "error": "payload_too_large",
                "message": message
            }),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, "database error");
                internal_body()
            }
            Self::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                internal_body()
            }
            Self::Internal { message } => {
                tracing::error!("internal error: {}", message);
                internal_body()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal_body() -> serde_json::Value {
    json!({
        "error": "internal_error",
        "message": "an internal error occurred"
    })
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            DbError::Validation(e) => Self::Validation(e),
            DbError::InvalidCredentials => Self::Unauthorized {
                reason: "invalid email or password",
            },
            _ => Self::Database(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => Self::NotFound {
                resource: "file",
                id: path,
            },
            StorageError::InvalidPath { path, .. } => Self::NotFound {
                resource: "file",
                id: path,
            },
            StorageError::BadSignature => Self::forbidden("invalid download signature"),
            StorageError::Expired => Self::forbidden("download link has expired"),
            _ => Self::Storage(e),
        }
    }
}
