//! Application wiring for launchtrack
//!
//! Builds the upstream client, store, cache and query service from a
//! [`Config`], and owns their lifecycle.

use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::{info, warn};

use crate::backfill::BackfillCoordinator;
use crate::cache::{CacheBackend, CacheError, CacheManager, MemoryCache, ReadThroughCache, RedisCache};
use crate::config::{CacheBackendKind, Config, StoreBackend};
use crate::data::{FetchError, LaunchSource, SpaceXClient};
use crate::query::QueryEngine;
use crate::refresh::{RefreshConfig, RefreshHandle};
use crate::server::{build_router, AppState};
use crate::service::TrackerService;
use crate::store::{DocumentStore, MemoryStore, SqliteStore, StoreError};

/// Errors raised while building the application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to create upstream client: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to open cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Long-lived service components
pub struct App {
    config: Config,
    store: Arc<dyn DocumentStore>,
    cache_backend: Arc<dyn CacheBackend>,
    backfill: Arc<BackfillCoordinator>,
    service: TrackerService,
}

impl App {
    /// Creates the upstream client and opens the store and cache named by `config`
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let source: Arc<dyn LaunchSource> = Arc::new(SpaceXClient::with_base_url(
            &config.upstream.base_url,
            config.upstream.timeout(),
        )?);

        let store: Arc<dyn DocumentStore> = match config.store.backend {
            StoreBackend::Sqlite => {
                let path = config.store.resolved_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                info!(path = %path.display(), "Opening SQLite store");
                Arc::new(SqliteStore::open(&path)?)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let cache_backend: Arc<dyn CacheBackend> = match config.cache.backend {
            CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
            CacheBackendKind::File => {
                let manager = match &config.cache.dir {
                    Some(dir) => CacheManager::with_dir(dir.clone()),
                    None => CacheManager::new().ok_or_else(|| {
                        CacheError::Unavailable("no cache directory available".to_string())
                    })?,
                };
                info!(dir = %manager.dir().display(), "Using file cache");
                Arc::new(manager)
            }
            CacheBackendKind::Redis => {
                info!(url = %config.cache.redis_url, "Using Redis cache");
                Arc::new(
                    RedisCache::open(&config.cache.redis_url)?
                        .with_timeout(config.cache.timeout()),
                )
            }
        };

        Ok(Self::with_clients(config, source, store, cache_backend))
    }

    /// Creates an App from already-built components
    pub fn with_clients(
        config: Config,
        source: Arc<dyn LaunchSource>,
        store: Arc<dyn DocumentStore>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Self {
        let backfill = Arc::new(BackfillCoordinator::new(source, store.clone()));
        let cache = ReadThroughCache::new(cache_backend.clone())
            .with_default_ttl(config.cache.ttl())
            .with_backend_timeout(config.cache.timeout());
        let service = TrackerService::new(QueryEngine::new(backfill.clone()), cache);

        Self {
            config,
            store,
            cache_backend,
            backfill,
            service,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backfill(&self) -> &Arc<BackfillCoordinator> {
        &self.backfill
    }

    pub fn service(&self) -> &TrackerService {
        &self.service
    }

    /// HTTP router over this app's service
    pub fn router(&self) -> Router {
        build_router(AppState::new(self.service.clone()))
    }

    /// Starts the scheduled refresh configured for this app
    pub fn spawn_refresh(&self) -> RefreshHandle {
        RefreshHandle::spawn(RefreshConfig::from(&self.config.refresh), self.backfill.clone())
    }

    /// Releases the store and cache connections
    ///
    /// Failures are logged; closing continues with the remaining resources.
    pub async fn close(&self) {
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Failed to close store");
        }
        if let Err(e) = self.cache_backend.close().await {
            warn!(error = %e, "Failed to close cache");
        }
        info!("Closed store and cache");
    }
}
