//! Session coordinator — the public operation surface.
//!
//! Every mutating operation on one session serializes through a per-session
//! `tokio::Mutex` held in a `DashMap`, so conflicting operations on the same
//! session never interleave while independent sessions never contend.

use std::sync::Arc;

use dashmap::DashMap;
use helpline_core::{
    ChatEvent, ChatMessage, ChatSession, ConnectionId, ParticipantRole, SessionId, SessionStatus,
};
use helpline_store::{ChatStore, SessionFilter};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::connection::ClientConnection;
use crate::errors::{CoordinatorError, Result};
use crate::notify::{Notification, Notifier};
use crate::registry::SessionRegistry;

/// Coordinates session lifecycle, message flow, and fan-out.
pub struct Coordinator {
    store: Arc<ChatStore>,
    registry: Arc<SessionRegistry>,
    notifier: Notifier,
    /// One logical lock per session id.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Coordinator {
    /// Wire a coordinator over its collaborators.
    pub fn new(store: Arc<ChatStore>, registry: Arc<SessionRegistry>, notifier: Notifier) -> Self {
        Self {
            store,
            registry,
            notifier,
            locks: DashMap::new(),
        }
    }

    /// The registry this coordinator fans out through.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The notification side-channel.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.as_str().to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a session for a customer, or return their existing open one.
    #[instrument(skip(self))]
    pub async fn create_or_get(
        &self,
        identity: i64,
        role: ParticipantRole,
    ) -> Result<ChatSession> {
        if role != ParticipantRole::Customer {
            return Err(CoordinatorError::Authorization(
                "only customers create sessions".into(),
            ));
        }
        let session = self.store.create_session(identity)?;
        info!(session_id = %session.session_id, owner = identity, "session ready");
        Ok(session)
    }

    /// List sessions for the admin console.
    pub async fn list(
        &self,
        role: ParticipantRole,
        filter: &SessionFilter,
    ) -> Result<Vec<ChatSession>> {
        if role != ParticipantRole::Admin {
            return Err(CoordinatorError::Authorization(
                "only admins list sessions".into(),
            ));
        }
        Ok(self.store.list_sessions(filter)?)
    }

    /// Attach a connection to a session and replay history.
    ///
    /// The single reconnect path: a client that lost its socket re-attaches
    /// with `since_seq` set to the last sequence id it saw and receives only
    /// the tail. First admin attach to a `waiting` session activates it and
    /// records the admin as assigned.
    #[instrument(skip(self, conn), fields(conn_id = %conn.id, session_id = %session_id))]
    pub async fn attach(
        &self,
        conn: &Arc<ClientConnection>,
        session_id: &SessionId,
        since_seq: Option<i64>,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(session_id)?;
        authorize_participant(&session, conn.role, conn.identity)?;

        self.registry.bind(session_id, conn).await;

        if conn.role == ParticipantRole::Admin && session.status == SessionStatus::Waiting {
            session =
                self.store
                    .set_status(session_id, SessionStatus::Active, Some(conn.identity))?;
            info!(admin = conn.identity, "session activated on attach");
            let _ = self
                .registry
                .fan_out(session_id, &ChatEvent::status_changed(&session), None)
                .await;
        }

        let messages = self.store.list_messages(session_id, since_seq)?;
        Ok((session, messages))
    }

    /// Append a message and fan it out to the other participants.
    ///
    /// A closed session rejects with `InvalidState` to the caller only. An
    /// admin sending into a `waiting` session activates it first.
    #[instrument(skip(self, body), fields(session_id = %session_id))]
    pub async fn send(
        &self,
        origin: Option<&ConnectionId>,
        session_id: &SessionId,
        role: ParticipantRole,
        identity: i64,
        body: &str,
    ) -> Result<ChatMessage> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.store.get_session(session_id)?;
        authorize_participant(&session, role, identity)?;

        if role == ParticipantRole::Admin && session.status == SessionStatus::Waiting {
            let activated =
                self.store
                    .set_status(session_id, SessionStatus::Active, Some(identity))?;
            info!(admin = identity, "session activated on first admin message");
            let _ = self
                .registry
                .fan_out(session_id, &ChatEvent::status_changed(&activated), None)
                .await;
        }

        let message =
            self.store
                .append_message(session_id, role.sender_kind(), Some(identity), body)?;

        let _ = self
            .registry
            .fan_out(session_id, &ChatEvent::message_appended(&message), origin)
            .await;

        self.notifier.publish(Notification {
            session_id: session_id.clone(),
            sender_kind: message.sender_kind,
            body: message.body.clone(),
        });

        Ok(message)
    }

    /// Mark the opposing role's messages as read.
    pub async fn mark_read(
        &self,
        session_id: &SessionId,
        role: ParticipantRole,
        identity: i64,
    ) -> Result<usize> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.store.get_session(session_id)?;
        authorize_participant(&session, role, identity)?;
        Ok(self.store.mark_read(session_id, role)?)
    }

    /// Close a session: notify every binding, then unbind them all.
    ///
    /// The owning customer or any admin may close. History is preserved.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn close(
        &self,
        session_id: &SessionId,
        role: ParticipantRole,
        identity: i64,
    ) -> Result<ChatSession> {
        let lock = self.session_lock(session_id);
        let closed = {
            let _guard = lock.lock().await;

            let session = self.store.get_session(session_id)?;
            authorize_participant(&session, role, identity)?;

            let closed = self
                .store
                .set_status(session_id, SessionStatus::Closed, None)?;
            info!(by = identity, role = %role, "session closed");

            // Everyone hears the close, the originator included.
            let _ = self
                .registry
                .fan_out(session_id, &ChatEvent::session_closed(session_id), None)
                .await;
            self.registry.unbind_session(session_id).await;
            closed
        };
        let _ = self.locks.remove(session_id.as_str());
        Ok(closed)
    }

    /// Fetch a session's messages, role-gated.
    pub async fn history(
        &self,
        session_id: &SessionId,
        role: ParticipantRole,
        identity: i64,
        since_seq: Option<i64>,
    ) -> Result<Vec<ChatMessage>> {
        let session = self.store.get_session(session_id)?;
        authorize_participant(&session, role, identity)?;
        Ok(self.store.list_messages(session_id, since_seq)?)
    }

    /// Fetch a session record, role-gated.
    pub async fn get_session(
        &self,
        session_id: &SessionId,
        role: ParticipantRole,
        identity: i64,
    ) -> Result<ChatSession> {
        let session = self.store.get_session(session_id)?;
        authorize_participant(&session, role, identity)?;
        Ok(session)
    }
}

/// Customers may touch only the session they own; admins may touch any.
fn authorize_participant(
    session: &ChatSession,
    role: ParticipantRole,
    identity: i64,
) -> Result<()> {
    match role {
        ParticipantRole::Admin => Ok(()),
        ParticipantRole::Customer if session.owner == identity => Ok(()),
        ParticipantRole::Customer => Err(CoordinatorError::Authorization(format!(
            "customer {identity} does not own session {}",
            session.session_id
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
