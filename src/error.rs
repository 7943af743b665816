use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// ErrorCode
///
/// Stable, machine-readable error identifiers sent alongside the human message.
/// Clients branch on these; the message text is free to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    Unauthenticated,
    Forbidden,
    ValidationFailed,
    InvalidState,
    InUse,
    EmailTaken,
    NotFound,
    Conflict,
    PaymentProviderError,
    IdentityProviderError,
    Internal,
}

/// ErrorResponse
///
/// The JSON body of every error response: `{"error": "...", "code": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

/// AppError
///
/// The single error type returned by handlers and the repository layer.
/// Each variant maps to exactly one `ErrorCode` and HTTP status.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InUse(String),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("payment provider: {0}")]
    PaymentProvider(String),

    #[error("identity provider: {0}")]
    IdentityProvider(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used across handlers and repositories.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthenticated => ErrorCode::Unauthenticated,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Validation(_) => ErrorCode::ValidationFailed,
            AppError::InvalidState(_) => ErrorCode::InvalidState,
            AppError::InUse(_) => ErrorCode::InUse,
            AppError::EmailTaken => ErrorCode::EmailTaken,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::PaymentProvider(_) => ErrorCode::PaymentProviderError,
            AppError::IdentityProvider(_) => ErrorCode::IdentityProviderError,
            AppError::Database(_) | AppError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidState
            | ErrorCode::InUse
            | ErrorCode::EmailTaken => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PaymentProviderError | ErrorCode::IdentityProviderError => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Helper for the common "resource with id not found" message.
pub fn not_found(resource: &str) -> AppError {
    AppError::NotFound(format!("{} not found", resource))
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        AppError::Validation(format!("Invalid value for: {}", fields.join(", ")))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Internal failures are logged in full and masked for the caller.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "database error");
                "An unexpected error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "An unexpected error occurred".to_string()
            }
            AppError::PaymentProvider(msg) => {
                tracing::error!(error = %msg, "payment provider error");
                "The payment provider request failed".to_string()
            }
            AppError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "identity provider error");
                "The identity provider request failed".to_string()
            }
            other => {
                tracing::debug!(code = ?code, error = %other, "request rejected");
                other.to_string()
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}
