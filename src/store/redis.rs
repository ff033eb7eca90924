//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use tracing::trace;

use super::{CounterStore, WriteOutcome};
use crate::error::StoreError;

/// A [`CounterStore`] backed by a shared Redis instance.
///
/// Conditional writes map onto Redis primitives: set-if-absent is
/// `SET NX PX`, and set-if-unchanged is a `WATCH`/`MULTI`/`EXEC`
/// transaction keyed on the caller's pre-image. No server-side scripting
/// is required.
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Create a store from an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to a Redis instance, e.g. `redis://127.0.0.1/`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(StoreError::new)?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::new)
    }
}

/// `PX 0` is a protocol error; the shortest expressible expiry is 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(StoreError::new)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<WriteOutcome, StoreError> {
        let mut conn = self.connection().await?;
        let reply: redis::Value = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::new)?;

        // SET ... NX replies nil when the key already exists.
        match reply {
            redis::Value::Nil => {
                trace!(key = %key, "set-if-absent lost to an existing key");
                Ok(WriteOutcome::Conflicted)
            }
            _ => Ok(WriteOutcome::Applied),
        }
    }

    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        expected: &[u8],
    ) -> Result<WriteOutcome, StoreError> {
        // WATCH state is scoped to the connection that issued it, so each
        // compare-and-swap attempt runs on a connection of its own.
        let mut conn = self.connection().await?;

        let _: () = redis::cmd("WATCH")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::new)?;

        let current: Option<Vec<u8>> = conn.get(key).await.map_err(StoreError::new)?;
        if current.as_deref() != Some(expected) {
            let _: () = redis::cmd("UNWATCH")
                .query_async(&mut conn)
                .await
                .map_err(StoreError::new)?;
            trace!(key = %key, "compare-and-swap pre-image mismatch");
            return Ok(WriteOutcome::Conflicted);
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .ignore();

        // EXEC replies nil when the watched key changed after our read.
        let reply: Option<()> = pipe
            .query_async(&mut conn)
            .await
            .map_err(StoreError::new)?;

        match reply {
            Some(()) => Ok(WriteOutcome::Applied),
            None => {
                trace!(key = %key, "compare-and-swap aborted by a concurrent write");
                Ok(WriteOutcome::Conflicted)
            }
        }
    }
}
