//! Per-client connection handle shared between the WebSocket tasks and the
//! registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use helpline_core::{ConnectionId, ParticipantRole};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Represents a connected WebSocket client.
///
/// The WebSocket task owns the `Arc`; the registry holds only `Weak`
/// back-references, so dropping the task is enough to retire the handle.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Participant identity, fixed at upgrade time.
    pub identity: i64,
    /// Participant role, fixed at upgrade time.
    pub role: ParticipantRole,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    is_alive: AtomicBool,
    /// When the last pong was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to a full channel.
    dropped_messages: AtomicU64,
    /// Cancelled when the connection must be torn down.
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection handle with a fresh id.
    pub fn new(identity: i64, role: ParticipantRole, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::generate(),
            identity,
            role,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Queue a pre-serialized text frame for the client.
    ///
    /// Returns `false` if the queue is full or closed, and increments the
    /// dropped counter. Never blocks.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat loop.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Token observed by the connection's tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tear the connection down; its tasks exit on observing the token.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the connection has been told to close.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
