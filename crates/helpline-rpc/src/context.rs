//! RPC dependency-injection context and caller identity.

use std::sync::Arc;

use helpline_core::{ConnectionId, ParticipantRole};
use helpline_runtime::{ClientConnection, Coordinator};

/// Shared context passed to every RPC handler.
///
/// Handlers reach the store only through the coordinator, which owns the
/// state machine and authorization.
pub struct RpcContext {
    /// Session coordinator — the operation surface handlers call into.
    pub coordinator: Arc<Coordinator>,
}

/// The connection a request arrived on.
///
/// Identity and role are fixed at upgrade time by the auth collaborator;
/// handlers never read them from request params.
pub struct Caller {
    /// The originating connection.
    pub connection: Arc<ClientConnection>,
}

impl Caller {
    /// Wrap a connection handle.
    pub fn new(connection: Arc<ClientConnection>) -> Self {
        Self { connection }
    }

    /// Participant identity.
    pub fn identity(&self) -> i64 {
        self.connection.identity
    }

    /// Participant role.
    pub fn role(&self) -> ParticipantRole {
        self.connection.role
    }

    /// Connection id, used to exclude the originator from fan-out.
    pub fn conn_id(&self) -> &ConnectionId {
        &self.connection.id
    }
}
