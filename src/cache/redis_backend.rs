//! Redis cache backend

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::{CacheBackend, CacheError};

/// Default bound on a single Redis round trip
const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_millis(500);

/// Cache backend storing values in Redis with `SETEX`
///
/// The multiplexed connection is opened on first use and reused; after a
/// failure it is dropped and reopened on the next call.
pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisCache {
    /// Creates a backend for `url` (e.g. `redis://localhost:6379/0`)
    ///
    /// No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            timeout: DEFAULT_REDIS_TIMEOUT,
        })
    }

    /// Overrides the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        debug!("Opened Redis connection");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }

    /// Maps a command outcome, dropping the connection on failure
    async fn finish<T>(
        &self,
        outcome: Result<redis::RedisResult<T>, tokio::time::error::Elapsed>,
    ) -> Result<T, CacheError> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.reset().await;
                Err(CacheError::Unavailable(e.to_string()))
            }
            Err(_) => {
                self.reset().await;
                Err(CacheError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let outcome = timeout(self.timeout, conn.get::<_, Option<String>>(key)).await;
        self.finish(outcome).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let outcome = timeout(self.timeout, conn.set_ex::<_, _, ()>(key, value, seconds)).await;
        self.finish(outcome).await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.reset().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_malformed_url() {
        assert!(matches!(
            RedisCache::open("not a url"),
            Err(CacheError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_as_error() {
        // Nothing listens on port 1; connecting must fail rather than hang
        let cache = RedisCache::open("redis://127.0.0.1:1/0")
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let result = cache.get("cache:missing").await;
        assert!(matches!(
            result,
            Err(CacheError::Unavailable(_)) | Err(CacheError::Timeout(_))
        ));
    }
}
