//! The persisted counter entry.

use serde::{Deserialize, Serialize};

/// Namespace prefix for all limiter keys in the store.
const KEY_PREFIX: &str = "limit:";

/// The single record stored per identifier per window.
///
/// An entry is created by the first consume of a window with a
/// set-if-absent write, rewritten in place by every later consume within
/// the window, and destroyed by the key's TTL. It is never deleted
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterEntry {
    /// The window ceiling, recorded once at creation.
    pub limit: u32,
    /// Operations left in the window. Never stored negative: a decrement
    /// is only attempted while this is positive.
    pub remaining: u32,
    /// Epoch seconds at which the window expires. Set once at creation
    /// and never rewritten; the key's TTL expires at or after this time.
    pub reset: i64,
}

impl CounterEntry {
    /// The store key for an identifier.
    pub fn key_for(id: &str) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    /// Serialize to the wire encoding.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the wire encoding.
    pub fn from_bytes(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }
}
