//! RPC error codes and error type.

use helpline_runtime::CoordinatorError;

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Session does not exist.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Operation not valid in the session's current status.
pub const INVALID_STATE: &str = "INVALID_STATE";
/// Illegal session status change.
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
/// Caller's role or identity does not permit the operation.
pub const NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// RPC error type returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Requested session not found.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Operation rejected by the session state machine.
    #[error("{message}")]
    InvalidState {
        /// Human-readable message.
        message: String,
    },

    /// Illegal status change.
    #[error("{message}")]
    InvalidTransition {
        /// Human-readable message.
        message: String,
    },

    /// Authorization failure.
    #[error("{message}")]
    NotAuthorized {
        /// Human-readable message.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotFound { .. } => SESSION_NOT_FOUND,
            Self::InvalidState { .. } => INVALID_STATE,
            Self::InvalidTransition { .. } => INVALID_TRANSITION,
            Self::NotAuthorized { .. } => NOT_AUTHORIZED,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    ///
    /// Internal errors carry a generic message; the real cause stays in the
    /// server log.
    pub fn to_error_body(&self) -> RpcErrorBody {
        let message = match self {
            Self::Internal { .. } => "Internal error".to_owned(),
            other => other.to_string(),
        };
        RpcErrorBody {
            code: self.code().to_owned(),
            message,
            details: None,
        }
    }
}

impl From<CoordinatorError> for RpcError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::NotFound(id) => Self::NotFound {
                message: format!("session not found: {id}"),
            },
            CoordinatorError::InvalidState { .. } => Self::InvalidState {
                message: err.to_string(),
            },
            CoordinatorError::InvalidTransition { .. } => Self::InvalidTransition {
                message: err.to_string(),
            },
            CoordinatorError::Authorization(message) => Self::NotAuthorized { message },
            CoordinatorError::Store(inner) => Self::Internal {
                message: inner.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_core::SessionStatus;

    #[test]
    fn codes_match_variants() {
        let err = RpcError::InvalidParams {
            message: "missing sessionId".into(),
        };
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert_eq!(
            RpcError::NotAuthorized {
                message: "nope".into()
            }
            .code(),
            "NOT_AUTHORIZED"
        );
    }

    #[test]
    fn internal_error_body_is_sanitized() {
        let err = RpcError::Internal {
            message: "sqlite error: disk I/O at /var/lib/helpline.db".into(),
        };
        let body = err.to_error_body();
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, "Internal error");
    }

    #[test]
    fn non_internal_body_keeps_message() {
        let err = RpcError::NotFound {
            message: "session not found: chat_1".into(),
        };
        let body = err.to_error_body();
        assert_eq!(body.code, "SESSION_NOT_FOUND");
        assert_eq!(body.message, "session not found: chat_1");
    }

    #[test]
    fn coordinator_errors_map_to_codes() {
        let cases = [
            (
                CoordinatorError::NotFound("chat_1".into()),
                SESSION_NOT_FOUND,
            ),
            (
                CoordinatorError::InvalidState {
                    session_id: "chat_1".into(),
                    status: SessionStatus::Closed,
                    operation: "append",
                },
                INVALID_STATE,
            ),
            (
                CoordinatorError::InvalidTransition {
                    from: SessionStatus::Closed,
                    to: SessionStatus::Active,
                },
                INVALID_TRANSITION,
            ),
            (
                CoordinatorError::Authorization("not yours".into()),
                NOT_AUTHORIZED,
            ),
        ];
        for (input, expected) in cases {
            let rpc: RpcError = input.into();
            assert_eq!(rpc.code(), expected);
        }
    }
}
