//! Database row types mapping `SQLite` rows to Rust structs.
//!
//! These represent the raw row shape — not the public API types. Conversion
//! to [`helpline_core::ChatSession`] / [`helpline_core::ChatMessage`] happens
//! in the repository layer, where status and sender strings are parsed into
//! their closed enums.

use serde::{Deserialize, Serialize};

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Internal numeric identity (storage ordering only).
    pub id: i64,
    /// Externally shareable id.
    pub public_id: String,
    /// Owning customer identity.
    pub owner: i64,
    /// Assigned staff identity.
    pub assigned_admin: Option<i64>,
    /// Status string (`waiting` / `active` / `closed`).
    pub status: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw message row from the `messages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    /// Owning session (internal id).
    pub session_id: i64,
    /// Per-session sequence number.
    pub seq: i64,
    /// Sender kind string (`customer` / `admin` / `system`).
    pub sender_kind: String,
    /// Sender identity (null for system).
    pub sender_identity: Option<i64>,
    /// Text payload.
    pub body: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: String,
}
