//! Message repository — append-only message rows keyed by per-session
//! sequence number.

use helpline_core::SenderKind;
use rusqlite::{params, Connection};

use crate::errors::Result;
use crate::row_types::MessageRow;

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert the next message for a session, assigning `seq = MAX(seq)+1`.
    ///
    /// Callers must run this inside an immediate transaction so the
    /// read-then-insert is atomic with respect to concurrent appends.
    pub fn append(
        conn: &Connection,
        session_id: i64,
        sender_kind: SenderKind,
        sender_identity: Option<i64>,
        body: &str,
    ) -> Result<MessageRow> {
        let now = chrono::Utc::now().to_rfc3339();
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let _ = conn.execute(
            "INSERT INTO messages (session_id, seq, sender_kind, sender_identity, body,
             is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![session_id, seq, sender_kind.as_str(), sender_identity, body, now],
        )?;

        Ok(MessageRow {
            session_id,
            seq,
            sender_kind: sender_kind.as_str().to_owned(),
            sender_identity,
            body: body.to_owned(),
            is_read: false,
            created_at: now,
        })
    }

    /// List messages ascending by `seq`, optionally only those after
    /// `since_seq` (reconnect catch-up).
    pub fn list_since(
        conn: &Connection,
        session_id: i64,
        since_seq: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(
            "SELECT session_id, seq, sender_kind, sender_identity, body, is_read, created_at
             FROM messages WHERE session_id = ?1 AND seq > ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id, since_seq.unwrap_or(0)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark unread messages authored by any of `sender_kinds` as read.
    ///
    /// Returns the number of rows updated (0 is a legal no-op).
    pub fn mark_read(
        conn: &Connection,
        session_id: i64,
        sender_kinds: &[SenderKind],
    ) -> Result<usize> {
        if sender_kinds.is_empty() {
            return Ok(0);
        }
        let placeholders: Vec<String> =
            (2..=sender_kinds.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE messages SET is_read = 1
             WHERE session_id = ?1 AND is_read = 0 AND sender_kind IN ({})",
            placeholders.join(", ")
        );
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(session_id)];
        for kind in sender_kinds {
            params_vec.push(Box::new(kind.as_str().to_owned()));
        }
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(Box::as_ref).collect();
        let changed = conn.execute(&sql, params_refs.as_slice())?;
        Ok(changed)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            session_id: row.get(0)?,
            seq: row.get(1)?,
            sender_kind: row.get(2)?,
            sender_identity: row.get(3)?,
            body: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
