//! Repository layer — stateless structs whose methods take `&Connection`.
//!
//! Repositories map rows and run SQL; policy (idempotent create, transition
//! validation, sequence atomicity) lives in [`crate::store::ChatStore`].

pub mod message;
pub mod session;

pub use message::MessageRepo;
pub use session::{ListSessionsOptions, SessionRepo};
