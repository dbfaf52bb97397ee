//! Cache module for query results
//!
//! This module provides a read-through cache that sits in front of the query
//! engine. Results are stored in a pluggable key-value backend with a TTL; a
//! backend outage degrades to uncached computation instead of failing the
//! request.

mod key;
mod manager;
mod memory;
mod read_through;
mod redis_backend;

pub use self::key::{canonicalize, CacheKey};
pub use self::manager::CacheManager;
pub use self::memory::MemoryCache;
pub use self::read_through::ReadThroughCache;
pub use self::redis_backend::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default time-to-live for cached query results
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Errors reported by a cache backend
///
/// These never reach callers of [`ReadThroughCache`]; they are logged and the
/// wrapped operation runs uncached.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// Filesystem failure in the file-backed cache
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store with per-entry expiry
///
/// `Ok(None)` means the key is absent or expired; connectivity problems are
/// reported as `Err` so callers can tell them apart.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Releases backend resources
    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
