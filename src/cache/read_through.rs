//! Read-through caching of operation results
//!
//! [`ReadThroughCache::get_or_compute`] takes the operation name and arguments
//! explicitly, derives a [`CacheKey`] from them, and only runs the wrapped
//! computation on a miss. The cache fails open: any backend error is logged
//! and the computation's result is returned uncached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{CacheBackend, CacheError, CacheKey, DEFAULT_CACHE_TTL};

/// Default bound on a single backend call
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-through cache in front of idempotent operations
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    backend_timeout: Duration,
}

impl ReadThroughCache {
    /// Wraps `backend` with the default TTL and backend timeout
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            default_ttl: DEFAULT_CACHE_TTL,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Sets the TTL used by [`Self::get_or_compute_default`]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Bounds how long a single backend get or set may take
    pub fn with_backend_timeout(mut self, backend_timeout: Duration) -> Self {
        self.backend_timeout = backend_timeout;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The underlying backend, for lifecycle management
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Returns the cached result of `operation(args)` or computes and stores it
    ///
    /// # Behavior
    /// - Hit: the stored value is decoded and returned; `compute` is not called
    /// - Miss: `compute` runs, its result is stored for `ttl` and returned
    /// - Backend error on read: `compute` runs and its result is returned without storing
    /// - Backend error on write: the computed result is still returned
    /// - Undecodable stored value: handled as a miss and overwritten
    /// - `compute` error: propagated, nothing is stored
    pub async fn get_or_compute<A, T, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute_if(operation, args, ttl, compute, |_| true)
            .await
    }

    /// [`Self::get_or_compute`], storing a computed value only if `cacheable` accepts it
    pub async fn get_or_compute_if<A, T, E, F, Fut, P>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        compute: F,
        cacheable: P,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&T) -> bool,
    {
        let key = match CacheKey::new(operation, args) {
            Ok(key) => key,
            Err(e) => {
                warn!(operation, error = %e, "Failed to derive cache key, computing uncached");
                return compute().await;
            }
        };

        match self.lookup(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<T>(&cached) {
                Ok(value) => {
                    info!(operation, key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(operation, key = %key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => {
                info!(operation, key = %key, "Cache miss, computing result");
            }
            Err(e) => {
                warn!(operation, key = %key, error = %e, "Cache read failed, computing uncached");
                return compute().await;
            }
        }

        let value = compute().await?;
        if cacheable(&value) {
            self.store(&key, &value, ttl).await;
        } else {
            debug!(operation, key = %key, "Result not cacheable, skipping store");
        }
        Ok(value)
    }

    /// [`Self::get_or_compute`] with the configured default TTL
    pub async fn get_or_compute_default<A, T, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        compute: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute(operation, args, self.default_ttl, compute)
            .await
    }

    async fn lookup(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        timeout(self.backend_timeout, self.backend.get(key.as_str()))
            .await
            .map_err(|_| CacheError::Timeout(self.backend_timeout))?
    }

    /// Stores a computed value; failures are logged and swallowed
    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode result for cache");
                return;
            }
        };

        let outcome = timeout(
            self.backend_timeout,
            self.backend.set_ex(key.as_str(), &encoded, ttl),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.backend_timeout))
        .and_then(|r| r);

        match outcome {
            Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "Stored result in cache"),
            Err(e) => warn!(key = %key, error = %e, "Cache write failed, returning uncached result"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sum {
        sum: i64,
    }

    /// Backend that fails reads and/or writes and counts calls
    #[derive(Default)]
    struct FlakyBackend {
        fail_get: bool,
        fail_set: bool,
        hang: bool,
        gets: AtomicUsize,
        sets: AtomicUsize,
    }

    #[async_trait]
    impl CacheBackend for FlakyBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail_get {
                Err(CacheError::Unavailable("connection refused".to_string()))
            } else {
                Ok(None)
            }
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.fail_set {
                Err(CacheError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    async fn add(calls: &AtomicUsize, x: i64, y: i64) -> Result<Sum, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Sum { sum: x + y })
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()));
        let calls = AtomicUsize::new(0);
        let args = serde_json::json!({"x": 1, "y": 2});

        let first = cache
            .get_or_compute("sum", &args, Duration::from_secs(60), || add(&calls, 1, 2))
            .await
            .unwrap();
        let second = cache
            .get_or_compute("sum", &args, Duration::from_secs(60), || add(&calls, 1, 2))
            .await
            .unwrap();

        assert_eq!(first, Sum { sum: 3 });
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_argument_order_does_not_defeat_cache() {
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()));
        let calls = AtomicUsize::new(0);

        let mut a = BTreeMap::new();
        a.insert("x", 5);
        a.insert("y", 7);
        let b = serde_json::json!({"y": 7, "x": 5});

        cache
            .get_or_compute_default("sum", &a, || add(&calls, 5, 7))
            .await
            .unwrap();
        let cached = cache
            .get_or_compute_default("sum", &b, || add(&calls, 5, 7))
            .await
            .unwrap();

        assert_eq!(cached.sum, 12);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_compute("sum", &(1, 2), Duration::from_millis(5), || add(&calls, 1, 2))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache
            .get_or_compute("sum", &(1, 2), Duration::from_millis(5), || add(&calls, 1, 2))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_computation() {
        let backend = Arc::new(FlakyBackend {
            fail_get: true,
            ..Default::default()
        });
        let cache = ReadThroughCache::new(backend.clone());
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_compute_default("sum", &(1, 2), || add(&calls, 1, 2))
            .await
            .unwrap();

        assert_eq!(result, Sum { sum: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_result() {
        let backend = Arc::new(FlakyBackend {
            fail_set: true,
            ..Default::default()
        });
        let cache = ReadThroughCache::new(backend.clone());
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_compute_default("sum", &(2, 3), || add(&calls, 2, 3))
            .await
            .unwrap();

        assert_eq!(result, Sum { sum: 5 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_and_fails_open() {
        let backend = Arc::new(FlakyBackend {
            hang: true,
            ..Default::default()
        });
        let cache =
            ReadThroughCache::new(backend).with_backend_timeout(Duration::from_millis(20));
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_compute_default("sum", &(1, 1), || add(&calls, 1, 1))
            .await
            .unwrap();

        assert_eq!(result.sum, 2);
    }

    #[tokio::test]
    async fn test_compute_error_is_not_cached() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ReadThroughCache::new(backend.clone());

        let result: Result<Sum, String> = cache
            .get_or_compute_default("sum", &(), || async { Err("boom".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_treated_as_miss() {
        let backend = Arc::new(MemoryCache::new());
        let key = CacheKey::new("sum", &(1, 2)).unwrap();
        backend
            .set_ex(key.as_str(), "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = ReadThroughCache::new(backend.clone());
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_compute_default("sum", &(1, 2), || add(&calls, 1, 2))
            .await
            .unwrap();

        assert_eq!(result.sum, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stored = backend.get(key.as_str()).await.unwrap().unwrap();
        assert_eq!(stored, r#"{"sum":3}"#);
    }

    #[tokio::test]
    async fn test_rejected_result_is_returned_but_not_stored() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ReadThroughCache::new(backend.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_compute_if(
                    "sum",
                    &(0, 0),
                    Duration::from_secs(60),
                    || add(&calls, 0, 0),
                    |value| value.sum != 0,
                )
                .await
                .unwrap();
            assert_eq!(result.sum, 0);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_default_ttl_is_one_hour() {
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()));
        assert_eq!(cache.default_ttl(), Duration::from_secs(3600));
    }
}
