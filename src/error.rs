use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(tokio_postgres::Error),

    /// A connection could not be checked out of the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The pool could not be built from the configuration.
    #[error("Pool configuration error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A storage call did not finish within the configured bound.
    #[error("Storage operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The sessions table does not exist.
    #[error("Session store is missing")]
    StoreMissing,

    /// A column could not be read from a row.
    #[error("Missing data in column: {0}")]
    MissingData(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The session lacks a required scope.
    #[error("Scope required: {0}")]
    Forbidden(String),

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.code() == Some(&SqlState::UNDEFINED_TABLE) {
            return AppError::StoreMissing;
        }
        AppError::Database(e)
    }
}

impl AppError {
    /// Whether the error means the backing store could not answer, as opposed
    /// to an authoritative rejection of the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Pool(_)
                | AppError::CreatePool(_)
                | AppError::Timeout(_)
                | AppError::StoreMissing
                | AppError::MissingData(_)
                | AppError::Internal(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Timeout(ref elapsed) => {
                tracing::error!("Storage operation timed out after {:?}", elapsed);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::StoreMissing => {
                tracing::error!("Session store is missing");
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing data in column: {}", column);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                let body = error_body(msg);
                return (
                    StatusCode::UNAUTHORIZED,
                    [
                        (header::WWW_AUTHENTICATE, "Bearer"),
                        (header::CONTENT_TYPE, "application/json"),
                    ],
                    body,
                )
                    .into_response();
            }

            AppError::Forbidden(ref scope) => {
                tracing::warn!("Scope required: {}", scope);
                (StatusCode::FORBIDDEN, format!("Scope required: {}", scope))
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            error_body(&message),
        )
            .into_response()
    }
}

fn error_body(message: &str) -> String {
    sonic_rs::to_string(&sonic_rs::json!({
        "error": message
    }))
    .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string())
}
