//! # helpline-store
//!
//! Durable record of sessions and messages — the sole source of truth for
//! conversation history and read/unread state.
//!
//! - **Connection pool**: `r2d2` over `rusqlite` with WAL mode and
//!   per-connection pragmas
//! - **Migrations**: version-tracked SQL embedded at compile time
//! - **Repositories**: stateless session/message repos, every method takes
//!   `&Connection`
//! - **[`ChatStore`]**: high-level facade — idempotent session creation,
//!   atomic per-session sequence assignment, transition-validated status
//!   updates, mark-read, catch-up listing

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use store::{ChatStore, SessionFilter};
