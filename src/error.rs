//! Error types for Jotter.

use thiserror::Error;

/// Common error type for Jotter.
#[derive(Error, Debug)]
pub enum JotterError {
    /// Database error.
    ///
    /// Wraps errors from the sqlx backend. Unique-constraint violations are
    /// converted to [`JotterError::Conflict`] instead.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error (missing/invalid token, wrong PIN).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Cross-owner access attempt on a resource the caller referenced.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found (or not owned by the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate sibling name or other uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The owner's storage quota cannot absorb the requested growth.
    #[error("storage limit exceeded: {requested} bytes requested, {available} available")]
    StorageLimitExceeded {
        /// Bytes the operation tried to add.
        requested: i64,
        /// Bytes still available to the owner.
        available: i64,
    },

    /// Self-move or move into the folder's own subtree.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Private-space operation attempted without a configured PIN.
    #[error("a PIN must be set before using the private space")]
    PinRequired,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for JotterError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return JotterError::Conflict(db_err.message().to_string());
            }
        }
        JotterError::Database(e.to_string())
    }
}

/// Result type alias for Jotter operations.
pub type Result<T> = std::result::Result<T, JotterError>;
