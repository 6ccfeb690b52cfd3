use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// The single error taxonomy returned by every operation. Translation to a
/// status code happens in one place, in `ResponseError` below.
#[derive(Debug)]
pub enum AppError {
    /// Bad or missing request field. 400.
    Validation(String),
    /// Any identity failure: missing/malformed/expired token, bad signature,
    /// or the token's user no longer exists. Uniformly 401.
    Unauthorized(String),
    /// Resource absent, or owned by someone else. Indistinguishable 404.
    NotFound(String),
    /// Duplicate email on registration. 400.
    Conflict(String),
    /// Blob-store failure or a stored file URL that cannot be mapped back to
    /// an in-bucket object. 500.
    Dependency(String),
    /// Query or transaction failure. 500.
    Database(String),
    /// In-process failure with no external party: hashing, token signing. 500.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Dependency(msg) => write!(f, "Dependency error: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Dependency(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Dependency(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg) => msg.clone(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse { detail })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}
