//! In-memory index of live connection bindings per session.
//!
//! The registry maps session ids to the connections attached to them and
//! fans events out to those connections. It holds only `Weak` references;
//! connection lifetime belongs to the WebSocket tasks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use helpline_core::{ChatEvent, ConnectionId, ParticipantRole, SessionId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::connection::ClientConnection;

/// One attached connection. Role and identity live on the connection.
struct Binding {
    conn: Weak<ClientConnection>,
}

#[derive(Default)]
struct Inner {
    /// session public id -> connection id -> binding
    by_session: HashMap<String, HashMap<String, Binding>>,
    /// connection id -> session public ids (admins bind to many)
    by_conn: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn remove_binding(&mut self, session_id: &str, conn_id: &str) {
        if let Some(bindings) = self.by_session.get_mut(session_id) {
            let _ = bindings.remove(conn_id);
            if bindings.is_empty() {
                let _ = self.by_session.remove(session_id);
            }
        }
        if let Some(sessions) = self.by_conn.get_mut(conn_id) {
            let _ = sessions.remove(session_id);
            if sessions.is_empty() {
                let _ = self.by_conn.remove(conn_id);
            }
        }
    }
}

/// Registry of live session bindings.
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Bind a connection to a session.
    ///
    /// A customer connection holds at most one binding: binding it to a
    /// second session evicts the first. Admin connections bind freely.
    pub async fn bind(&self, session_id: &SessionId, conn: &Arc<ClientConnection>) {
        let mut inner = self.inner.write().await;
        if conn.role == ParticipantRole::Customer {
            let prior: Vec<String> = inner
                .by_conn
                .get(conn.id.as_str())
                .map(|sessions| {
                    sessions
                        .iter()
                        .filter(|s| s.as_str() != session_id.as_str())
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for old in prior {
                debug!(conn_id = %conn.id, old_session = %old, "evicting prior customer binding");
                inner.remove_binding(&old, conn.id.as_str());
            }
        }
        let _ = inner
            .by_session
            .entry(session_id.as_str().to_owned())
            .or_default()
            .insert(
                conn.id.as_str().to_owned(),
                Binding {
                    conn: Arc::downgrade(conn),
                },
            );
        let _ = inner
            .by_conn
            .entry(conn.id.as_str().to_owned())
            .or_default()
            .insert(session_id.as_str().to_owned());
        debug!(conn_id = %conn.id, session_id = %session_id, role = %conn.role, "bound connection");
    }

    /// Remove every binding for a connection. Never errors; this is the
    /// disconnect path.
    pub async fn unbind_connection(&self, conn_id: &ConnectionId) {
        let mut inner = self.inner.write().await;
        let sessions: Vec<String> = inner
            .by_conn
            .get(conn_id.as_str())
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        for session in sessions {
            inner.remove_binding(&session, conn_id.as_str());
        }
    }

    /// Remove every binding for a session (close path).
    pub async fn unbind_session(&self, session_id: &SessionId) {
        let mut inner = self.inner.write().await;
        let conn_ids: Vec<String> = inner
            .by_session
            .get(session_id.as_str())
            .map(|bindings| bindings.keys().cloned().collect())
            .unwrap_or_default();
        for conn_id in conn_ids {
            inner.remove_binding(session_id.as_str(), &conn_id);
        }
    }

    /// Fan an event out to every live binding of a session.
    ///
    /// The event is serialized once. Bindings whose connection is gone are
    /// pruned; a binding whose outbound queue is full is treated as failed:
    /// it is unbound and its connection cancelled, leaving the client to
    /// recover via catch-up on reconnect. Never blocks, never errors.
    ///
    /// Returns the number of connections the event was queued for.
    pub async fn fan_out(
        &self,
        session_id: &SessionId,
        event: &ChatEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let mut inner = self.inner.write().await;
        let Some(bindings) = inner.by_session.get(session_id.as_str()) else {
            return 0;
        };

        let mut delivered = 0;
        let mut stale: Vec<String> = Vec::new();
        let mut overflowed: Vec<Arc<ClientConnection>> = Vec::new();
        for (conn_id, binding) in bindings {
            if exclude.is_some_and(|ex| ex.as_str() == conn_id) {
                continue;
            }
            match binding.conn.upgrade() {
                Some(conn) => {
                    if conn.send(Arc::clone(&json)) {
                        delivered += 1;
                    } else {
                        warn!(
                            conn_id = %conn.id,
                            session_id = %session_id,
                            dropped = conn.drop_count(),
                            "outbound queue full, unbinding connection"
                        );
                        overflowed.push(conn);
                    }
                }
                None => stale.push(conn_id.clone()),
            }
        }
        for conn_id in stale {
            inner.remove_binding(session_id.as_str(), &conn_id);
        }
        for conn in overflowed {
            inner.remove_binding(session_id.as_str(), conn.id.as_str());
            conn.close();
        }
        debug!(event_type = %event.event_type, session_id = %session_id, delivered, "fanned out event");
        delivered
    }

    /// Live connections bound to a session.
    pub async fn bindings(&self, session_id: &SessionId) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.read().await;
        inner
            .by_session
            .get(session_id.as_str())
            .map(|bindings| bindings.values().filter_map(|b| b.conn.upgrade()).collect())
            .unwrap_or_default()
    }

    /// Number of sessions with at least one binding.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.by_session.len()
    }

    /// Number of distinct bound connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.by_conn.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_conn(
        identity: i64,
        role: ParticipantRole,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::new(identity, role, tx)), rx)
    }

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[tokio::test]
    async fn bind_and_count() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = make_conn(1, ParticipantRole::Customer);
        registry.bind(&sid("chat_a"), &conn).await;
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(registry.bindings(&sid("chat_a")).await.len(), 1);
    }

    #[tokio::test]
    async fn customer_second_bind_evicts_first() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = make_conn(1, ParticipantRole::Customer);
        registry.bind(&sid("chat_a"), &conn).await;
        registry.bind(&sid("chat_b"), &conn).await;

        assert!(registry.bindings(&sid("chat_a")).await.is_empty());
        assert_eq!(registry.bindings(&sid("chat_b")).await.len(), 1);
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn admin_binds_to_many_sessions() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &conn).await;
        registry.bind(&sid("chat_b"), &conn).await;

        assert_eq!(registry.bindings(&sid("chat_a")).await.len(), 1);
        assert_eq!(registry.bindings(&sid("chat_b")).await.len(), 1);
        assert_eq!(registry.session_count().await, 2);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn rebind_same_session_is_idempotent() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = make_conn(1, ParticipantRole::Customer);
        registry.bind(&sid("chat_a"), &conn).await;
        registry.bind(&sid("chat_a"), &conn).await;
        assert_eq!(registry.bindings(&sid("chat_a")).await.len(), 1);
    }

    #[tokio::test]
    async fn unbind_connection_clears_all_bindings() {
        let registry = SessionRegistry::new();
        let (admin, _rx) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &admin).await;
        registry.bind(&sid("chat_b"), &admin).await;

        registry.unbind_connection(&admin.id).await;
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn unbind_unknown_connection_is_noop() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = make_conn(1, ParticipantRole::Customer);
        registry.unbind_connection(&conn.id).await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn unbind_session_clears_every_binding() {
        let registry = SessionRegistry::new();
        let (customer, _rx1) = make_conn(1, ParticipantRole::Customer);
        let (admin, _rx2) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &customer).await;
        registry.bind(&sid("chat_a"), &admin).await;

        registry.unbind_session(&sid("chat_a")).await;
        assert!(registry.bindings(&sid("chat_a")).await.is_empty());
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn fan_out_reaches_all_bindings() {
        let registry = SessionRegistry::new();
        let (customer, mut rx1) = make_conn(1, ParticipantRole::Customer);
        let (admin, mut rx2) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &customer).await;
        registry.bind(&sid("chat_a"), &admin).await;

        let event = ChatEvent::new("message.appended", Some(sid("chat_a")), None);
        let delivered = registry.fan_out(&sid("chat_a"), &event, None).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn fan_out_excludes_originator() {
        let registry = SessionRegistry::new();
        let (customer, mut rx1) = make_conn(1, ParticipantRole::Customer);
        let (admin, mut rx2) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &customer).await;
        registry.bind(&sid("chat_a"), &admin).await;

        let event = ChatEvent::new("message.appended", Some(sid("chat_a")), None);
        let delivered = registry
            .fan_out(&sid("chat_a"), &event, Some(&customer.id))
            .await;
        assert_eq!(delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn fan_out_to_unknown_session_delivers_nothing() {
        let registry = SessionRegistry::new();
        let event = ChatEvent::new("message.appended", Some(sid("chat_x")), None);
        assert_eq!(registry.fan_out(&sid("chat_x"), &event, None).await, 0);
    }

    #[tokio::test]
    async fn fan_out_prunes_dropped_connections() {
        let registry = SessionRegistry::new();
        let (customer, _rx1) = make_conn(1, ParticipantRole::Customer);
        registry.bind(&sid("chat_a"), &customer).await;
        drop(customer);

        let event = ChatEvent::new("message.appended", Some(sid("chat_a")), None);
        assert_eq!(registry.fan_out(&sid("chat_a"), &event, None).await, 0);
        // Pruned, so the session has no bindings left.
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn fan_out_overflow_unbinds_and_cancels() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let slow = Arc::new(ClientConnection::new(1, ParticipantRole::Customer, tx));
        registry.bind(&sid("chat_a"), &slow).await;

        // Fill the queue, then fan out past it.
        assert!(slow.send(Arc::new("filler".into())));
        let event = ChatEvent::new("message.appended", Some(sid("chat_a")), None);
        assert_eq!(registry.fan_out(&sid("chat_a"), &event, None).await, 0);

        assert!(slow.is_closed());
        assert!(registry.bindings(&sid("chat_a")).await.is_empty());
    }

    #[tokio::test]
    async fn fan_out_delivers_in_order_to_both() {
        let registry = SessionRegistry::new();
        let (c1, mut rx1) = make_conn(1, ParticipantRole::Customer);
        let (c2, mut rx2) = make_conn(9, ParticipantRole::Admin);
        registry.bind(&sid("chat_a"), &c1).await;
        registry.bind(&sid("chat_a"), &c2).await;

        for i in 1..=3 {
            let event = ChatEvent::new(
                "message.appended",
                Some(sid("chat_a")),
                Some(serde_json::json!({ "seq": i })),
            );
            let _ = registry.fan_out(&sid("chat_a"), &event, None).await;
        }

        for rx in [&mut rx1, &mut rx2] {
            for expected in 1..=3 {
                let frame = rx.try_recv().unwrap();
                let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
                assert_eq!(v["data"]["seq"], expected);
            }
        }
    }
}
