//! Error types for the swear jar node.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Jar or member absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorization gate rejected the caller
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Concurrent write collision or lock timeout; nothing was committed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, unknown or expired session token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same request unchanged can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(_) => "conflict",
            Error::Unauthorized(_) => "unauthorized",
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => "internal",
            Error::Config(_) => "config",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<swearjar_ledger::Error> for Error {
    fn from(e: swearjar_ledger::Error) -> Self {
        match e {
            swearjar_ledger::Error::InvalidInput(msg) => Error::Validation(msg),
            swearjar_ledger::Error::MemberNotFound(name) => {
                Error::NotFound(format!("member {name}"))
            }
            forbidden @ swearjar_ledger::Error::Forbidden { .. } => {
                Error::Forbidden(forbidden.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    retryable: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
