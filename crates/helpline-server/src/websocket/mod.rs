//! WebSocket connection handling: message dispatch and session lifecycle.

pub mod handler;
pub mod session;
