//! Identity resolution for `/ws` upgrades.
//!
//! The gateway in front of this service is trusted: `identity` and `role`
//! query params are taken as-is. A connection without an identity is a
//! guest and gets a process-local anonymous identity from a reserved range
//! so one-open-session-per-identity still holds for them.

use std::sync::atomic::{AtomicI64, Ordering};

use helpline_core::ParticipantRole;
use serde::Deserialize;

/// First identity in the reserved anonymous range. Real identities from
/// the gateway are expected to stay below this.
pub const ANONYMOUS_IDENTITY_BASE: i64 = 1_000_000_000;

static NEXT_ANONYMOUS: AtomicI64 = AtomicI64::new(ANONYMOUS_IDENTITY_BASE);

/// Query params accepted on the `/ws` upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Participant identity, if the gateway supplied one.
    pub identity: Option<i64>,
    /// `customer` or `admin`; anything else (or absent) means customer.
    pub role: Option<String>,
}

/// Resolved identity of an upgraded connection.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    /// Numeric participant identity.
    pub identity: i64,
    /// Participant role.
    pub role: ParticipantRole,
    /// Whether the identity came from the anonymous range.
    pub anonymous: bool,
}

/// Resolve a principal from upgrade query params.
pub fn authenticate(params: &ConnectParams) -> Principal {
    let role = params
        .role
        .as_deref()
        .and_then(ParticipantRole::parse)
        .unwrap_or(ParticipantRole::Customer);

    match params.identity {
        Some(identity) => Principal {
            identity,
            role,
            anonymous: false,
        },
        None => Principal {
            identity: NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed),
            role,
            anonymous: true,
        },
    }
}
