//! Live-session runtime: connection handles, the in-memory session
//! registry, the notification side-channel, and the coordinator that
//! enforces the session state machine.

#![deny(unsafe_code)]

pub mod connection;
pub mod coordinator;
pub mod errors;
pub mod notify;
pub mod registry;

pub use connection::ClientConnection;
pub use coordinator::Coordinator;
pub use errors::{CoordinatorError, Result};
pub use notify::{Notification, Notifier};
pub use registry::SessionRegistry;
