//! Error types for swearjar-ledger.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by domain rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The authorization gate rejected the caller.
    #[error("user {user_id} may not {action} jar {jar_id}")]
    Forbidden {
        user_id: String,
        jar_id: String,
        action: &'static str,
    },

    /// A negative delta targeted a member that was never added.
    #[error("member not found: {0}")]
    MemberNotFound(String),
}
