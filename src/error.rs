//! Error types for the Headroom limiter.

use thiserror::Error;

/// Transport or protocol failure while talking to the counter store.
///
/// A failed precondition on a conditional write is not an error; it is
/// reported as [`WriteOutcome::Conflicted`](crate::store::WriteOutcome).
#[derive(Debug, Error)]
#[error("Store communication error: {0}")]
pub struct StoreError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    /// Wrap a client error, preserving it as the source.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }
}

/// Main error type for limiter operations.
#[derive(Debug, Error)]
pub enum LimitError {
    /// Invalid construction parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store could not be reached or misbehaved
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A counter entry failed to encode or decode
    #[error("Counter entry codec error: {0}")]
    Entry(#[from] serde_json::Error),

    /// Conditional writes kept conflicting past the configured bound
    #[error("Write contention unresolved after {attempts} attempts")]
    Contention {
        /// Number of read-write passes performed before giving up
        attempts: u32,
    },
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, LimitError>;
