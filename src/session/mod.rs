//! # Session Module
//!
//! Timer-driven session logging.
//!
//! This module handles:
//! - The persisted session record ([`Session`])
//! - Store collaborator traits and implementations ([`store`])
//! - The `Idle -> Armed -> Idle` session logger state machine ([`logger`])

pub mod logger;
pub mod store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use logger::SessionLogger;
pub use store::{DoseRateMirror, JsonlSessionStore, MemorySessionStore, SessionStore};

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A user-initiated, timer-bounded period of periodic sample logging.
///
/// Created when logging starts (persisted immediately with `stopped_at = 0`)
/// and mutated exactly once, to set `stopped_at`, either by explicit stop or
/// by automatic expiry. Sessions are never deleted by this core.
///
/// The association between a session and its dose-rate samples is implicit
/// via the timestamp/date partition, not a foreign key: the log store is
/// date-partitioned, not session-partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier, generated at creation
    pub id: Uuid,

    /// User-supplied name, required non-empty
    pub name: String,

    /// Creation time, epoch millis
    pub created_at_millis: i64,

    /// Stop time, epoch millis; 0 while the session is active
    pub stopped_at_millis: i64,

    /// Automatic expiry in hours; 0 = unbounded
    pub time_limit_hours: u64,

    /// Sampling cadence in seconds, >= 1
    pub time_interval_secs: u64,
}

impl Session {
    /// Whether the session is still active (never stopped).
    pub fn is_active(&self) -> bool {
        self.stopped_at_millis == 0
    }
}
