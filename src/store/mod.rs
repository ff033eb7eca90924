//! Counter store abstraction and its backends.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Outcome of a conditional write.
///
/// Conflict detection happens only here: backends translate whatever shape
/// their client library reports a failed precondition in into
/// [`WriteOutcome::Conflicted`], so the limiter never inspects replies
/// itself. Transport failures are a [`StoreError`], never an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Applied,
    /// The precondition failed: the key was already present
    /// (set-if-absent), or its value changed since the read the write was
    /// keyed on (set-if-unchanged).
    Conflicted,
}

/// Trait for counter store backends.
///
/// This trait abstracts over the external key-value store holding the
/// counters, allowing the limiter to work against Redis in production and
/// an in-process store in tests. Implementations must guarantee that two
/// `set_if_unchanged` calls with the same `expected` pre-image cannot both
/// apply, and that a key is gone at or after its TTL.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the raw value at `key`, or `None` if the key is absent or
    /// expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` at `key` with the given TTL only if the key is
    /// absent.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<WriteOutcome, StoreError>;

    /// Write `value` at `key` with the given TTL only if the stored value
    /// still equals `expected`.
    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        expected: &[u8],
    ) -> Result<WriteOutcome, StoreError>;
}
