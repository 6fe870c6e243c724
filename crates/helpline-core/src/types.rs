//! Roles, session lifecycle, and the session/message record types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Role of a connected participant, supplied by the auth collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// A customer — may act only on sessions they own.
    Customer,
    /// A staff member — may act on any session.
    Admin,
}

impl ParticipantRole {
    /// The sender kind a message from this participant carries.
    #[must_use]
    pub fn sender_kind(self) -> SenderKind {
        match self {
            Self::Customer => SenderKind::Customer,
            Self::Admin => SenderKind::Admin,
        }
    }

    /// The opposing role, whose messages this role's mark-read targets.
    #[must_use]
    pub fn opposing(self) -> Self {
        match self {
            Self::Customer => Self::Admin,
            Self::Admin => Self::Customer,
        }
    }

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }

    /// Parse from the stable lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author kind of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// Authored by the owning customer.
    Customer,
    /// Authored by a staff member.
    Admin,
    /// Emitted by the server itself (no sender identity).
    System,
}

impl SenderKind {
    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }

    /// Parse from the stable lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle state.
///
/// `waiting → active → closed`, with `waiting → closed` allowed and `closed`
/// terminal. All status changes go through this table — there is no other
/// transition path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, no admin attached yet.
    Waiting,
    /// An admin has attached or sent at least one message.
    Active,
    /// Terminal; accepts no new messages.
    Closed,
}

impl SessionStatus {
    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Active)
                | (Self::Waiting, Self::Closed)
                | (Self::Active, Self::Closed)
        )
    }

    /// Whether the session still accepts messages and bindings.
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Parse from the stable lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One customer-support conversation thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Externally shareable session id.
    pub session_id: SessionId,
    /// Identity of the initiating customer (anonymous identities included).
    pub owner: i64,
    /// Staff member currently handling the session.
    pub assigned_admin: Option<i64>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Creation timestamp (RFC-3339).
    pub created_at: String,
    /// Bumped on every status change and message append (RFC-3339).
    pub updated_at: String,
}

/// One message within a session.
///
/// `seq` is the sole ordering key — timestamps are informational only, so
/// clock skew can never reorder a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Per-session sequence number, starting at 1, no gaps.
    pub seq: i64,
    /// Owning session (external id).
    pub session_id: SessionId,
    /// Author kind.
    pub sender_kind: SenderKind,
    /// Author identity (`None` for system messages).
    pub sender_identity: Option<i64>,
    /// Text payload, non-empty.
    pub body: String,
    /// Set by the recipient-side mark-read operation.
    pub is_read: bool,
    /// Creation timestamp (RFC-3339, informational).
    pub created_at: String,
}
