//! Error types for the umbrella server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Postgres SQLSTATE raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// SQLSTATE class of integrity constraint violations
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Stable error codes exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    Unauthorized = 2,
    TokenExpired = 3,
    StorageFailure = 4,
    NotFound = 5,
    NotAvailable = 6,
    AlreadyReturned = 7,
    Duplicate = 8,
    BadValue = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Already returned: {0}")]
    AlreadyReturned(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out waiting for a row lock")]
    LockTimeout,

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) => ErrorCode::Unauthorized,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::NotAvailable(_) => ErrorCode::NotAvailable,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::LockTimeout | AppError::Constraint(_) | AppError::Database(_) => {
                ErrorCode::StorageFailure
            }
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::NotAvailable(_) | AppError::AlreadyReturned(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::LockTimeout | AppError::Constraint(_) | AppError::Database(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let code = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(LOCK_NOT_AVAILABLE) => AppError::LockTimeout,
            Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => {
                AppError::Constraint(e.to_string())
            }
            _ => AppError::Database(e),
        }
    }
}

/// Malformed or mistyped JSON body
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Authentication(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::NotAvailable(msg)
            | AppError::AlreadyReturned(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::TokenExpired => "Token has expired, please log in again".to_string(),
            AppError::LockTimeout => {
                tracing::warn!("Row lock wait timed out");
                "The service is busy, please retry".to_string()
            }
            AppError::Constraint(msg) => {
                tracing::error!("Constraint violated: {}", msg);
                "The service is temporarily unavailable, please retry".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "The service is temporarily unavailable, please retry".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
