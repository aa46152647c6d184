/// Unified error types for the bookstore catalog
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Malformed or missing request input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required entity or result does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// SQLite errors from the record store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record store unreachable, timed out or returned unusable data
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Document (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors (startup only)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl CatalogError {
    /// Stable error code exposed to clients
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::InvalidArgument(_) => "InvalidArgument",
            CatalogError::NotFound(_) => "NotFound",
            _ => "InternalServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert CatalogError to HTTP response
impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            CatalogError::InvalidArgument(msg) | CatalogError::NotFound(msg) => msg.clone(),
            other => {
                tracing::error!(error = %other, "request_failed");
                "Internal server error".to_string() // Don't leak details
            }
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
