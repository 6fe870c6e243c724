//! RPC method handlers and parameter helpers.

use helpline_core::SessionId;
use serde_json::Value;

use crate::errors::RpcError;
use crate::registry::MethodRegistry;

pub mod message;
pub mod session;

/// Maximum message body length (8 KB).
pub const MAX_BODY_LENGTH: usize = 8_192;

/// Register every chat method on the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register("session.create", session::CreateSessionHandler);
    registry.register("session.list", session::ListSessionsHandler);
    registry.register("session.attach", session::AttachSessionHandler);
    registry.register("session.close", session::CloseSessionHandler);
    registry.register("message.send", message::SendMessageHandler);
    registry.register("message.mark_read", message::MarkReadHandler);
    registry.register("message.history", message::MessageHistoryHandler);
}

/// Extract a required string parameter.
pub fn require_string_param(params: Option<&Value>, name: &str) -> Result<String, RpcError> {
    params
        .and_then(|p| p.get(name))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter '{name}'"),
        })
}

/// Extract the required `sessionId` parameter.
pub fn require_session_id(params: Option<&Value>) -> Result<SessionId, RpcError> {
    let raw = require_string_param(params, "sessionId")?;
    Ok(SessionId::from_string(raw))
}

/// Extract an optional integer parameter, rejecting non-integer values.
pub fn optional_i64_param(params: Option<&Value>, name: &str) -> Result<Option<i64>, RpcError> {
    match params.and_then(|p| p.get(name)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| RpcError::InvalidParams {
            message: format!("Parameter '{name}' must be an integer"),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test helpers
// ─────────────────────────────────────────────────────────────────────────────
