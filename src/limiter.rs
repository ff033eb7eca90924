//! Core fixed-window limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, trace};

use crate::entry::CounterEntry;
use crate::error::{LimitError, Result};
use crate::store::{CounterStore, WriteOutcome};

/// Default window ceiling when none is configured.
const DEFAULT_MAX: u32 = 2500;
/// Default window length when none is configured.
const DEFAULT_DURATION: Duration = Duration::from_millis(3_600_000);
/// Default bound on read-write passes before a consume gives up.
const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Upper bound in milliseconds on the random backoff between contended
/// attempts.
const RETRY_JITTER_MAX_MS: u64 = 5;

/// Configuration for a [`Limiter`].
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Maximum operations allowed per window
    pub max: u32,
    /// Window length
    pub duration: Duration,
    /// Bound on read-write passes before a consume fails with
    /// [`LimitError::Contention`]
    pub max_attempts: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX,
            duration: DEFAULT_DURATION,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Whether a consume was admitted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The operation fits in the current window.
    Allowed,
    /// The window is exhausted.
    Denied,
}

/// The result of a decided consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Whether the operation was admitted
    pub decision: Decision,
    /// The window ceiling
    pub total: u32,
    /// Operations left in the window, as durably written (zero on denial)
    pub remaining: u32,
    /// Epoch seconds at which the window expires
    pub reset: i64,
}

impl Quota {
    /// Whether the operation was admitted.
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allowed
    }
}

/// A fixed-window rate limiter for a single identifier.
///
/// The limiter holds no counter state of its own; the current count and
/// window expiry live in the store under `limit:<id>`, shared by every
/// process limiting the same identifier. Each [`consume`](Limiter::consume)
/// is one pass of a read, a local computation, and a conditional write,
/// retried from the read when the write loses a race.
pub struct Limiter<S> {
    key: String,
    store: Arc<S>,
    config: LimiterConfig,
}

impl<S: CounterStore> Limiter<S> {
    /// Create a limiter with default configuration.
    pub fn new(id: &str, store: Arc<S>) -> Result<Self> {
        Self::with_config(id, store, LimiterConfig::default())
    }

    /// Create a limiter with explicit configuration.
    ///
    /// Fails fast on invalid parameters; a constructed limiter never
    /// re-validates them.
    pub fn with_config(id: &str, store: Arc<S>, config: LimiterConfig) -> Result<Self> {
        if id.is_empty() {
            return Err(LimitError::Config(
                "identifier must not be empty".to_string(),
            ));
        }
        if config.max == 0 {
            return Err(LimitError::Config("max must be positive".to_string()));
        }
        if config.duration.is_zero() {
            return Err(LimitError::Config("duration must be positive".to_string()));
        }
        if config.max_attempts == 0 {
            return Err(LimitError::Config(
                "max_attempts must be positive".to_string(),
            ));
        }

        Ok(Self {
            key: CounterEntry::key_for(id),
            store,
            config,
        })
    }

    /// Consume one operation from the identifier's current window.
    ///
    /// Creates the window on first use, decrements it otherwise, and
    /// reports denial without writing once the window is exhausted. A
    /// conditional write that loses a race against another process is
    /// resolved by re-reading and retrying, up to the configured attempt
    /// bound. Store errors propagate to the caller without retry.
    pub async fn consume(&self) -> Result<Quota> {
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let jitter_ms = rand::thread_rng().gen_range(1..=RETRY_JITTER_MAX_MS);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }

            let quota = match self.store.get(&self.key).await? {
                None => self.create_window().await?,
                Some(raw) => self.decrement(&raw).await?,
            };

            match quota {
                Some(quota) => {
                    trace!(
                        key = %self.key,
                        decision = ?quota.decision,
                        remaining = quota.remaining,
                        reset = quota.reset,
                        "Consume decided"
                    );
                    return Ok(quota);
                }
                None => {
                    trace!(key = %self.key, attempt = attempt, "Write conflicted, retrying");
                }
            }
        }

        debug!(
            key = %self.key,
            attempts = self.config.max_attempts,
            "Giving up under write contention"
        );
        Err(LimitError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Start a fresh window, consuming its first permit.
    ///
    /// Returns `None` when another process created the window first; the
    /// caller then re-reads and decrements that window instead, so the
    /// loser of the creation race is still counted.
    async fn create_window(&self) -> Result<Option<Quota>> {
        let now_ms = Utc::now().timestamp_millis();
        let reset = (now_ms + self.config.duration.as_millis() as i64) / 1000;
        let entry = CounterEntry {
            limit: self.config.max,
            remaining: self.config.max - 1,
            reset,
        };
        let raw = entry.to_bytes()?;

        match self
            .store
            .set_if_absent(&self.key, &raw, self.config.duration)
            .await?
        {
            WriteOutcome::Applied => {
                debug!(
                    key = %self.key,
                    limit = entry.limit,
                    reset = reset,
                    "Created rate limit window"
                );
                Ok(Some(Quota {
                    decision: Decision::Allowed,
                    total: entry.limit,
                    remaining: entry.remaining,
                    reset,
                }))
            }
            WriteOutcome::Conflicted => Ok(None),
        }
    }

    /// Take one permit from an existing window, or report exhaustion.
    ///
    /// The compare-and-swap is keyed on the raw bytes read, so two
    /// concurrent decrements cannot both apply against the same pre-image.
    async fn decrement(&self, raw: &[u8]) -> Result<Option<Quota>> {
        let entry = CounterEntry::from_bytes(raw)?;

        if entry.remaining == 0 {
            // Denial needs no store mutation.
            return Ok(Some(Quota {
                decision: Decision::Denied,
                total: entry.limit,
                remaining: 0,
                reset: entry.reset,
            }));
        }

        let next = CounterEntry {
            remaining: entry.remaining - 1,
            ..entry
        };

        // The new TTL covers only the time left until reset, so the window
        // boundary never shifts on decrement. `reset` truncates to whole
        // seconds, so the residue can dip below zero at the window tail;
        // the store backends floor it to the shortest expressible expiry.
        let now_ms = Utc::now().timestamp_millis();
        let ttl = Duration::from_millis((next.reset * 1000 - now_ms).max(1) as u64);

        match self
            .store
            .set_if_unchanged(&self.key, &next.to_bytes()?, ttl, raw)
            .await?
        {
            WriteOutcome::Applied => Ok(Some(Quota {
                decision: Decision::Allowed,
                total: next.limit,
                remaining: next.remaining,
                reset: next.reset,
            })),
            WriteOutcome::Conflicted => Ok(None),
        }
    }
}
