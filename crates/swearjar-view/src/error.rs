//! Error types for the view model.

use thiserror::Error;

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// View model errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed frame: {0}")]
    Frame(#[from] serde_json::Error),
}
