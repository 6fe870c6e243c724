//! [`ChatStore`] — high-level facade over the pool and repositories.
//!
//! All policy the spec assigns to the store lives here: idempotent session
//! creation, closed-session rejection, atomic per-session sequence
//! assignment, and transition validation. Repositories stay row-level.

use helpline_core::{ChatMessage, ChatSession, ParticipantRole, SenderKind, SessionId, SessionStatus};
use rusqlite::TransactionBehavior;
use tracing::{debug, instrument};

use crate::connection::ConnectionPool;
use crate::errors::{Result, StoreError};
use crate::repositories::{MessageRepo, SessionRepo};
use crate::row_types::{MessageRow, SessionRow};

pub use crate::repositories::session::ListSessionsOptions as SessionFilter;

/// Durable record of sessions and messages.
pub struct ChatStore {
    pool: ConnectionPool,
}

impl ChatStore {
    /// Create a store over an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Create a session for `owner`, or return their existing non-closed one.
    ///
    /// Idempotent: exactly one non-closed session may exist per identity, so
    /// repeated creates return the same `session_id`. A customer whose only
    /// session is closed gets a fresh one.
    #[instrument(skip(self))]
    pub fn create_session(&self, owner: i64) -> Result<ChatSession> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row = if let Some(existing) = SessionRepo::get_open_by_owner(&tx, owner)? {
            debug!(owner, session_id = %existing.public_id, "returning existing open session");
            existing
        } else {
            let created = SessionRepo::create(&tx, owner)?;
            debug!(owner, session_id = %created.public_id, "session created");
            created
        };
        tx.commit()?;
        session_from_row(row)
    }

    /// Fetch a session by external id.
    pub fn get_session(&self, session_id: &SessionId) -> Result<ChatSession> {
        let conn = self.pool.get()?;
        let row = SessionRepo::get_by_public_id(&conn, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        session_from_row(row)
    }

    /// Append a message, assigning the next per-session sequence id.
    ///
    /// Fails with [`StoreError::SessionNotFound`] for unknown sessions and
    /// [`StoreError::InvalidState`] when the session is closed. The sequence
    /// read and insert share an immediate transaction, so concurrent appends
    /// on the same session can never observe the same `MAX(seq)`.
    #[instrument(skip(self, body), fields(session_id = %session_id))]
    pub fn append_message(
        &self,
        session_id: &SessionId,
        sender_kind: SenderKind,
        sender_identity: Option<i64>,
        body: &str,
    ) -> Result<ChatMessage> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let session = SessionRepo::get_by_public_id(&tx, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        let status = parse_status(&session)?;
        if !status.is_open() {
            return Err(StoreError::InvalidState {
                session_id: session.public_id,
                status,
                operation: "append",
            });
        }
        let row = MessageRepo::append(&tx, session.id, sender_kind, sender_identity, body)?;
        let _ = SessionRepo::touch(&tx, session.id)?;
        tx.commit()?;
        debug!(seq = row.seq, "message appended");
        message_from_row(row, session_id.clone())
    }

    /// List a session's messages ascending by sequence id.
    ///
    /// With `since_seq`, returns only messages with a strictly greater
    /// sequence number — the reconnect catch-up query.
    pub fn list_messages(
        &self,
        session_id: &SessionId,
        since_seq: Option<i64>,
    ) -> Result<Vec<ChatMessage>> {
        let conn = self.pool.get()?;
        let session = SessionRepo::get_by_public_id(&conn, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        let rows = MessageRepo::list_since(&conn, session.id, since_seq)?;
        rows.into_iter()
            .map(|row| message_from_row(row, session_id.clone()))
            .collect()
    }

    /// Mark messages authored by the opposing role as read.
    ///
    /// System messages address both parties and are marked by either reader.
    /// Returns the number of messages updated (0 is a legal no-op).
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn mark_read(&self, session_id: &SessionId, reader: ParticipantRole) -> Result<usize> {
        let conn = self.pool.get()?;
        let session = SessionRepo::get_by_public_id(&conn, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        let kinds = [reader.opposing().sender_kind(), SenderKind::System];
        MessageRepo::mark_read(&conn, session.id, &kinds)
    }

    /// Transition a session's status, optionally assigning an admin.
    ///
    /// Fails with [`StoreError::InvalidTransition`] for any change the state
    /// machine disallows (including closing an already-closed session).
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn set_status(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
        assigned_admin: Option<i64>,
    ) -> Result<ChatSession> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let session = SessionRepo::get_by_public_id(&tx, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        let from = parse_status(&session)?;
        if !from.can_transition_to(status) {
            return Err(StoreError::InvalidTransition { from, to: status });
        }
        let _ = SessionRepo::set_status(&tx, session.id, status, assigned_admin)?;
        let updated = SessionRepo::get_by_public_id(&tx, session_id.as_str())?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.as_str().to_owned()))?;
        tx.commit()?;
        debug!(from = %from, to = %status, "status changed");
        session_from_row(updated)
    }

    /// List sessions, newest-updated first, with optional filters.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<ChatSession>> {
        let conn = self.pool.get()?;
        let rows = SessionRepo::list(&conn, filter)?;
        rows.into_iter().map(session_from_row).collect()
    }
}

fn parse_status(row: &SessionRow) -> Result<SessionStatus> {
    SessionStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown session status '{}'", row.status)))
}

fn session_from_row(row: SessionRow) -> Result<ChatSession> {
    let status = parse_status(&row)?;
    Ok(ChatSession {
        session_id: SessionId::from_string(row.public_id),
        owner: row.owner,
        assigned_admin: row.assigned_admin,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn message_from_row(row: MessageRow, session_id: SessionId) -> Result<ChatMessage> {
    let sender_kind = SenderKind::parse(&row.sender_kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown sender kind '{}'", row.sender_kind)))?;
    Ok(ChatMessage {
        seq: row.seq,
        session_id,
        sender_kind,
        sender_identity: row.sender_identity,
        body: row.body,
        is_read: row.is_read,
        created_at: row.created_at,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::connection::{new_in_memory, ConnectionConfig};
    use crate::migrations::run_migrations;

    fn make_store() -> ChatStore {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        ChatStore::new(pool)
    }

    #[test]
    fn create_session_starts_waiting() {
        let store = make_store();
        let session = store.create_session(42).unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.owner, 42);
        assert!(session.assigned_admin.is_none());
    }

    #[test]
    fn create_session_is_idempotent_while_open() {
        let store = make_store();
        let first = store.create_session(7).unwrap();
        let second = store.create_session(7).unwrap();
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn closed_session_allows_fresh_create() {
        let store = make_store();
        let first = store.create_session(7).unwrap();
        let _ = store
            .set_status(&first.session_id, SessionStatus::Closed, None)
            .unwrap();
        let fresh = store.create_session(7).unwrap();
        assert_ne!(first.session_id, fresh.session_id);
        assert_eq!(fresh.status, SessionStatus::Waiting);
    }

    #[test]
    fn get_session_not_found() {
        let store = make_store();
        let err = store.get_session(&SessionId::from("chat_missing")).unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[test]
    fn append_and_list_in_order() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        let m1 = store
            .append_message(&session.session_id, SenderKind::Customer, Some(1), "Xin chào")
            .unwrap();
        let m2 = store
            .append_message(&session.session_id, SenderKind::Admin, Some(9), "Chào bạn")
            .unwrap();
        assert_eq!(m1.seq, 1);
        assert_eq!(m2.seq, 2);

        let all = store.list_messages(&session.session_id, None).unwrap();
        let seqs: Vec<i64> = all.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(all[0].body, "Xin chào");
    }

    #[test]
    fn append_to_unknown_session_fails() {
        let store = make_store();
        let err = store
            .append_message(&SessionId::from("chat_none"), SenderKind::Customer, Some(1), "x")
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[test]
    fn append_to_closed_session_fails_history_intact() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        let _ = store
            .append_message(&session.session_id, SenderKind::Customer, Some(1), "before")
            .unwrap();
        let _ = store
            .set_status(&session.session_id, SessionStatus::Closed, None)
            .unwrap();

        let err = store
            .append_message(&session.session_id, SenderKind::Customer, Some(1), "after")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));

        let history = store.list_messages(&session.session_id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "before");
    }

    #[test]
    fn append_bumps_updated_at() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let _ = store
            .append_message(&session.session_id, SenderKind::Customer, Some(1), "x")
            .unwrap();
        let reloaded = store.get_session(&session.session_id).unwrap();
        assert!(reloaded.updated_at > session.updated_at);
    }

    #[test]
    fn catch_up_returns_tail_only() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        for i in 1..=8 {
            store
                .append_message(&session.session_id, SenderKind::Customer, Some(1), &format!("m{i}"))
                .unwrap();
        }
        let tail = store.list_messages(&session.session_id, Some(5)).unwrap();
        let seqs: Vec<i64> = tail.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![6, 7, 8]);
    }

    #[test]
    fn mark_read_flips_opposing_only() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        store
            .append_message(&session.session_id, SenderKind::Customer, Some(1), "c")
            .unwrap();
        store
            .append_message(&session.session_id, SenderKind::Admin, Some(9), "a")
            .unwrap();

        // Customer reads: admin messages flip, own stay unread.
        let changed = store.mark_read(&session.session_id, ParticipantRole::Customer).unwrap();
        assert_eq!(changed, 1);
        let all = store.list_messages(&session.session_id, None).unwrap();
        assert!(!all[0].is_read);
        assert!(all[1].is_read);

        // Second read is a no-op.
        assert_eq!(
            store.mark_read(&session.session_id, ParticipantRole::Customer).unwrap(),
            0
        );
    }

    #[test]
    fn waiting_to_active_sets_admin() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        let active = store
            .set_status(&session.session_id, SessionStatus::Active, Some(9))
            .unwrap();
        assert_eq!(active.status, SessionStatus::Active);
        assert_eq!(active.assigned_admin, Some(9));
    }

    #[test]
    fn close_of_closed_session_is_invalid_transition() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        let _ = store
            .set_status(&session.session_id, SessionStatus::Closed, None)
            .unwrap();
        let err = store
            .set_status(&session.session_id, SessionStatus::Closed, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn reopen_is_invalid_transition() {
        let store = make_store();
        let session = store.create_session(1).unwrap();
        let _ = store
            .set_status(&session.session_id, SessionStatus::Closed, None)
            .unwrap();
        let err = store
            .set_status(&session.session_id, SessionStatus::Active, Some(9))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: SessionStatus::Closed,
                to: SessionStatus::Active
            }
        ));
    }

    #[test]
    fn list_sessions_filters_and_orders() {
        let store = make_store();
        let a = store.create_session(1).unwrap();
        let b = store.create_session(2).unwrap();
        let _ = store
            .set_status(&a.session_id, SessionStatus::Active, Some(9))
            .unwrap();

        let waiting = store
            .list_sessions(&SessionFilter {
                status: Some(SessionStatus::Waiting),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].session_id, b.session_id);

        let assigned = store
            .list_sessions(&SessionFilter {
                assigned_admin: Some(9),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].session_id, a.session_id);

        // a was updated last, so it lists first unfiltered.
        let all = store.list_sessions(&SessionFilter::default()).unwrap();
        assert_eq!(all[0].session_id, a.session_id);
    }

    #[test]
    fn concurrent_appends_never_duplicate_seq() {
        let store = std::sync::Arc::new(make_store());
        let session = store.create_session(1).unwrap();
        let mut handles = Vec::new();
        for t in 0..4 {
            let store = store.clone();
            let sid = session.session_id.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..10 {
                    let _ = store
                        .append_message(&sid, SenderKind::Customer, Some(1), &format!("t{t}m{i}"))
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let all = store.list_messages(&session.session_id, None).unwrap();
        let seqs: Vec<i64> = all.iter().map(|m| m.seq).collect();
        let expected: Vec<i64> = (1..=40).collect();
        assert_eq!(seqs, expected);
    }
}
