//! Error types and handling
//!
//! Every failure the broker can report maps to one machine-checkable
//! [`ErrorKind`]. Errors are rendered as the failure half of the response
//! envelope: `{"success": false, "error": <kind>, "message": ..., "hint": ...}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::StoreError;
use crate::services::cipher::DecryptError;

/// Machine-checkable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    InvalidInput,
    NotFound,
    DecryptError,
    StoreError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DecryptError => "decrypt_error",
            ErrorKind::StoreError => "store_error",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// No or invalid caller credential (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but the access policy denies the operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or malformed input, detected before any store access (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No matching record (404), optionally with remediation guidance
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        hint: Option<String>,
    },

    /// Stored ciphertext failed authentication (500, fail closed)
    #[error("Decryption failed: {0}")]
    Decrypt(#[from] DecryptError),

    /// Key store collaborator failure (500, 503 on timeout)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        AppError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            hint: None,
        }
    }

    pub fn not_found_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Decrypt(_) => ErrorKind::DecryptError,
            AppError::Store(_) => ErrorKind::StoreError,
            AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            AppError::NotFound { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Timeout | StoreError::Conflict(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Decrypt(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller. Internal failures are not echoed.
    fn public_message(&self) -> String {
        match self {
            AppError::Decrypt(_) => "Stored key could not be decrypted".to_string(),
            AppError::Store(StoreError::Timeout) => "Key store timed out".to_string(),
            AppError::Store(StoreError::Conflict(_)) => {
                "Key was modified concurrently; retry the request".to_string()
            }
            AppError::Store(_) => "Key store request failed".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure half of the response envelope
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Error kind identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Remediation guidance (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        match kind {
            ErrorKind::DecryptError | ErrorKind::StoreError | ErrorKind::InternalError => {
                error!(error = %self, error_type = kind.as_str(), "Request error");
            }
            ErrorKind::Forbidden => {
                warn!(error = %self, error_type = kind.as_str(), "Request denied");
            }
            _ => {}
        }

        let mut body = ErrorResponse::new(kind.as_str(), self.public_message());
        if let Some(hint) = self.hint() {
            body = body.with_hint(hint);
        }

        (status, Json(body)).into_response()
    }
}

// Implement From for common error types

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Result type alias for handlers and broker operations
pub type AppResult<T> = Result<T, AppError>;
