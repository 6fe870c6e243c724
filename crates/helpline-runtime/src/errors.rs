//! Error types for coordinator operations.

use helpline_core::SessionStatus;
use helpline_store::StoreError;
use thiserror::Error;

/// Errors returned to the originating caller of a coordinator operation.
///
/// These never surface to other participants: fan-out failures are handled
/// inside the registry.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Requested session does not exist.
    #[error("session not found: {0}")]
    NotFound(String),

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

    /// Caller's role or identity does not permit the operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(id) => Self::NotFound(id),
            StoreError::InvalidState {
                session_id,
                status,
                operation,
            } => Self::InvalidState {
                session_id,
                status,
                operation,
            },
            StoreError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::Store(other),
        }
    }
}

/// Convenience type alias for coordinator results.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
