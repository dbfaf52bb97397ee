//! In-process cache backend

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CacheBackend, CacheError};

/// Cache backend holding entries in a process-local map
///
/// Expired entries are dropped when read and swept on every write, so the map
/// only holds live entries plus those expired since the last write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64));

        let mut entries = self.entries.lock();
        entries.retain(|_, (_, exp)| *exp > now);
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted_on_read() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_write_sweeps_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache
                .set_ex(&format!("short:{}", i), "v", Duration::from_millis(1))
                .await
                .unwrap();
        }
        cache.set_ex("long", "v", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.set_ex("fresh", "v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("v"));
    }
}
