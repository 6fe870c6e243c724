//! Error types for the message store.

use helpline_core::SessionStatus;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Operation illegal for the session's current status.
    #[error("session {session_id} is {status}: {operation} not allowed")]
    InvalidState {
        /// Session the operation targeted.
        session_id: String,
        /// Current status that rejected the operation.
        status: SessionStatus,
        /// The rejected operation, for diagnostics.
        operation: &'static str,
    },

    /// Illegal status change.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// A stored row failed to parse into its typed form.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
