//! Server-pushed event envelope and constructors.
//!
//! Every event delivered to a bound connection is a [`ChatEvent`] serialized
//! as `{type, sessionId, timestamp, data}`. The three fan-out event types are
//! `message.appended`, `session.status_changed`, and `session.closed`; the
//! multiplexer additionally sends `connection.established` on connect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::SessionId;
use crate::types::{ChatMessage, ChatSession};

/// A message was appended to a session.
pub const EVENT_MESSAGE_APPENDED: &str = "message.appended";
/// A session's lifecycle status changed.
pub const EVENT_SESSION_STATUS_CHANGED: &str = "session.status_changed";
/// A session was closed (terminal).
pub const EVENT_SESSION_CLOSED: &str = "session.closed";
/// Sent to a client immediately after the WebSocket upgrade.
pub const EVENT_CONNECTION_ESTABLISHED: &str = "connection.established";

/// Server-pushed event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Event type (e.g. `message.appended`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Associated session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ChatEvent {
    /// Create a new event with the current UTC timestamp.
    pub fn new(
        event_type: impl Into<String>,
        session_id: Option<SessionId>,
        data: Option<Value>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            session_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            data,
        }
    }

    /// `message.appended` carrying the full message record.
    #[must_use]
    pub fn message_appended(message: &ChatMessage) -> Self {
        Self::new(
            EVENT_MESSAGE_APPENDED,
            Some(message.session_id.clone()),
            serde_json::to_value(message).ok().map(|m| {
                serde_json::json!({ "message": m })
            }),
        )
    }

    /// `session.status_changed` carrying the updated session record.
    #[must_use]
    pub fn status_changed(session: &ChatSession) -> Self {
        Self::new(
            EVENT_SESSION_STATUS_CHANGED,
            Some(session.session_id.clone()),
            serde_json::to_value(session).ok().map(|s| {
                serde_json::json!({ "session": s })
            }),
        )
    }

    /// `session.closed` — terminal notification to all bindings.
    #[must_use]
    pub fn session_closed(session_id: &SessionId) -> Self {
        Self::new(
            EVENT_SESSION_CLOSED,
            Some(session_id.clone()),
            Some(serde_json::json!({ "sessionId": session_id })),
        )
    }
}
