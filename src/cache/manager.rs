//! File-backed cache backend
//!
//! Provides a `CacheManager` that stores serializable data to JSON files with
//! expiry timestamps. Expired entries read as misses through the
//! [`CacheBackend`] interface.

use std::fs;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{CacheBackend, CacheError};

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached
    cached_at: DateTime<Utc>,
    /// When the cache entry expires
    expires_at: DateTime<Utc>,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages reading and writing cached data to disk
///
/// The cache manager stores data as JSON files in an XDG-compliant cache directory
/// (`~/.cache/launchtrack/` on Linux). Each cache entry includes an expiry timestamp.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "launchtrack")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the directory cache files are written to
    pub fn dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    ///
    /// Characters that are not portable in file names are replaced.
    fn cache_path(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("{}.json", file_stem))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes data to the cache with the given time-to-live
    ///
    /// # Arguments
    /// * `key` - Unique identifier for the cache entry
    /// * `data` - The data to cache (must implement Serialize)
    /// * `ttl` - How long the cache entry should be considered fresh
    pub fn write<T: Serialize>(&self, key: &str, data: &T, ttl: StdDuration) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let now = Utc::now();
        let expires_at = Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at,
        };

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(self.cache_path(key), json)?;
        Ok(())
    }

    /// Reads data from the cache
    ///
    /// Returns `Ok(None)` if the entry doesn't exist or cannot be parsed.
    /// Returns `Some(CachedData)` with `is_expired = true` if the entry exists but has expired.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedData<T>>, CacheError> {
        let path = self.cache_path(key);
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Ok(entry) = serde_json::from_str::<CacheEntry<T>>(&content) else {
            return Ok(None);
        };

        let is_expired = Utc::now() >= entry.expires_at;

        Ok(Some(CachedData {
            data: entry.data,
            cached_at: entry.cached_at,
            is_expired,
        }))
    }
}

#[async_trait]
impl CacheBackend for CacheManager {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let manager = self.clone();
        let key = key.to_string();
        let cached = tokio::task::spawn_blocking(move || manager.read::<String>(&key))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))??;

        Ok(cached.filter(|c| !c.is_expired).map(|c| c.data))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: StdDuration) -> Result<(), CacheError> {
        let manager = self.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || manager.write(&key, &value, ttl))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?
    }
}
