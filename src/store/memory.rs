//! In-process counter store.
//!
//! Backs the test suite and single-process deployments with the same
//! conditional-write semantics the Redis backend provides, including TTL
//! expiry: an expired key reads as absent and may be recreated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CounterStore, WriteOutcome};
use crate::error::StoreError;

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// An in-memory [`CounterStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conditional writes that have been applied.
    ///
    /// This is primarily useful for testing.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Drop all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(value) if value.is_live(now) => Ok(Some(value.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<WriteOutcome, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).map_or(false, |v| v.is_live(now)) {
            return Ok(WriteOutcome::Conflicted);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Applied)
    }

    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        expected: &[u8],
    ) -> Result<WriteOutcome, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(stored) if stored.is_live(now) && stored.bytes == expected => {
                stored.bytes = value.to_vec();
                stored.expires_at = now + ttl;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Conflicted),
        }
    }
}
