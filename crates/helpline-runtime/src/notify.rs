//! Notification side-channel for appended messages.
//!
//! Downstream consumers (e.g. a push-delivery bridge) subscribe to a
//! broadcast stream; the chat path publishes and never waits on receivers.

use helpline_core::{SenderKind, SessionId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// One appended message, as seen by notification consumers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// Who authored it.
    pub sender_kind: SenderKind,
    /// Message text.
    pub body: String,
}

/// Fan-out handle over a `tokio::sync::broadcast` channel.
///
/// Publishing with no subscribers, or past a lagging subscriber, is not an
/// error: delivery here is best-effort by contract.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    /// Create a notifier with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish a notification. Absent or lagging subscribers are ignored.
    pub fn publish(&self, notification: Notification) {
        trace!(session_id = %notification.session_id, "publishing notification");
        let _ = self.tx.send(notification);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}
