//! # Error Handling
//!
//! Custom error types and their conversion to HTTP responses. Every handler
//! returns `AppResult<T>`; actix turns an `AppError` into the wire format
//! through the `ResponseError` impl below.
//!
//! ## HTTP Status Code Mapping:
//! - BadRequest → 400, reason surfaced verbatim as `{"error": <reason>}`
//! - NotFound → 404, `{"error": "Not found", "message": <detail>}`
//! - Internal/Config → 500, generic body; the real detail only goes to the log
//!
//! ## Why two body shapes:
//! Validation failures are actionable by the client, so the reason is the
//! whole body. Server-side failures must not leak internals, so the client
//! gets a fixed message while the full error is recorded via tracing.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (storage writes, inference failures)
/// - **BadRequest**: Client sent invalid or missing input
/// - **NotFound**: Requested resource doesn't exist (a valid outcome, not a crash)
/// - **Config**: Configuration loading or validation problems
#[derive(Debug)]
pub enum AppError {
    /// Server-side failures (database errors, engine failures, I/O)
    Internal(String),

    /// Client sent invalid or missing data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::BadRequest(msg) => {
                HttpResponse::BadRequest().json(json!({ "error": msg }))
            }
            AppError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": "Not found",
                "message": msg,
            })),
            AppError::Internal(msg) | AppError::Config(msg) => {
                // Full detail stays server-side; the client gets a fixed body.
                tracing::error!(error = %msg, "Internal server error");
                HttpResponse::InternalServerError().json(json!({
                    "error": "Internal Server Error",
                    "message": "An unexpected error occurred",
                }))
            }
        }
    }
}

/// Anything that bubbles up as `anyhow::Error` is a server-side failure.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Database errors are never the client's fault at this layer; lookups that
/// can legitimately miss use `fetch_optional` and never produce an error.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(format!("Database error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
