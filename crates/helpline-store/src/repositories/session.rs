//! Session repository — row-level session CRUD.

use helpline_core::{SessionId, SessionStatus};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::row_types::SessionRow;

/// Options for listing sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListSessionsOptions {
    /// Filter by status.
    pub status: Option<SessionStatus>,
    /// Filter by assigned admin identity.
    pub assigned_admin: Option<i64>,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new `waiting` session for `owner`.
    pub fn create(conn: &Connection, owner: i64) -> Result<SessionRow> {
        let public_id = SessionId::generate().into_inner();
        let now = chrono::Utc::now().to_rfc3339();

        let _ = conn.execute(
            "INSERT INTO sessions (public_id, owner, status, created_at, updated_at)
             VALUES (?1, ?2, 'waiting', ?3, ?3)",
            params![public_id, owner, now],
        )?;
        let id = conn.last_insert_rowid();

        Ok(SessionRow {
            id,
            public_id,
            owner,
            assigned_admin: None,
            status: SessionStatus::Waiting.as_str().to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a session by its external id.
    pub fn get_by_public_id(conn: &Connection, public_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, public_id, owner, assigned_admin, status, created_at, updated_at
                 FROM sessions WHERE public_id = ?1",
                params![public_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get the owner's current non-closed session, if any.
    pub fn get_open_by_owner(conn: &Connection, owner: i64) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, public_id, owner, assigned_admin, status, created_at, updated_at
                 FROM sessions WHERE owner = ?1 AND status != 'closed'",
                params![owner],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List sessions with filtering, newest-updated first.
    pub fn list(conn: &Connection, opts: &ListSessionsOptions) -> Result<Vec<SessionRow>> {
        use std::fmt::Write;
        let mut sql = String::from(
            "SELECT id, public_id, owner, assigned_admin, status, created_at, updated_at
             FROM sessions WHERE 1=1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = opts.status {
            let _ = write!(sql, " AND status = ?{}", param_values.len() + 1);
            param_values.push(Box::new(status.as_str().to_owned()));
        }
        if let Some(admin) = opts.assigned_admin {
            let _ = write!(sql, " AND assigned_admin = ?{}", param_values.len() + 1);
            param_values.push(Box::new(admin));
        }
        sql.push_str(" ORDER BY updated_at DESC, id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Write a new status (and optionally the assigned admin), bumping
    /// `updated_at`. Transition legality is validated by the caller.
    pub fn set_status(
        conn: &Connection,
        id: i64,
        status: SessionStatus,
        assigned_admin: Option<i64>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = if let Some(admin) = assigned_admin {
            conn.execute(
                "UPDATE sessions SET status = ?1, assigned_admin = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![status.as_str(), admin, now, id],
            )?
        } else {
            conn.execute(
                "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, id],
            )?
        };
        Ok(changed > 0)
    }

    /// Bump `updated_at` (called on message append).
    pub fn touch(conn: &Connection, id: i64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            public_id: row.get(1)?,
            owner: row.get(2)?,
            assigned_admin: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
