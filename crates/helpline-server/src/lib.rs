//! HTTP + WebSocket front end for the support-chat service.
//!
//! One Axum server exposing `/health`, `/metrics`, and the `/ws` upgrade.
//! Every connected client gets its own task pair (read loop + outbound
//! writer) multiplexing RPC responses and session events over a single
//! socket.

pub mod auth;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, HelplineServer};
pub use shutdown::ShutdownCoordinator;
