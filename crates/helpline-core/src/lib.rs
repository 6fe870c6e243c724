//! # helpline-core
//!
//! Foundation types for the Helpline support-chat server.
//!
//! This crate provides the shared vocabulary that all other Helpline crates
//! depend on:
//!
//! - **Ids**: [`SessionId`] and [`ConnectionId`] newtypes (UUID v7,
//!   time-ordered) for type safety across crate boundaries
//! - **Roles**: [`ParticipantRole`] and [`SenderKind`] closed enums —
//!   role-driven behavior is exhaustive matching, never string comparison
//! - **Lifecycle**: [`SessionStatus`] with the legal transition table
//! - **Records**: [`ChatSession`] and [`ChatMessage`] wire-facing types
//! - **Events**: [`ChatEvent`] envelope pushed to bound connections

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod types;

pub use events::{ChatEvent, EVENT_CONNECTION_ESTABLISHED};
pub use ids::{ConnectionId, SessionId};
pub use types::{ChatMessage, ChatSession, ParticipantRole, SenderKind, SessionStatus};
