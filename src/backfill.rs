//! Backfill of the persistent store from the upstream API
//!
//! [`BackfillCoordinator::ensure_fresh`] is the only writer of the store. It
//! fetches rockets, launchpads and launches (in that order, since launches
//! embed summaries of the other two), then upserts all three collections.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::data::{normalize_launches, FetchError, LaunchSource};
use crate::store::{DocumentStore, StoreError};

/// Errors that abort a backfill
#[derive(Debug, Error)]
pub enum BackfillError {
    /// The upstream API failed or returned unusable data
    #[error("Failed to fetch from upstream: {0}")]
    Fetch(#[from] FetchError),

    /// Writing or counting documents failed
    #[error("Failed to update store: {0}")]
    Store(#[from] StoreError),
}

/// Serializes refreshes of the store
pub struct BackfillCoordinator {
    source: Arc<dyn LaunchSource>,
    store: Arc<dyn DocumentStore>,
    /// Held for the whole duration of a refresh
    flight: Mutex<()>,
}

impl BackfillCoordinator {
    pub fn new(source: Arc<dyn LaunchSource>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            source,
            store,
            flight: Mutex::new(()),
        }
    }

    /// The store this coordinator writes to
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Populates the store from upstream when forced or when it is empty
    ///
    /// A non-forced call on a populated store is a no-op. Concurrent callers
    /// queue behind the in-flight refresh; a non-forced caller that waited
    /// re-checks the store and skips the fetch if it got populated meanwhile.
    ///
    /// # Returns
    /// * `Ok(n)` - Number of launches upserted (0 when nothing was fetched)
    /// * `Err(BackfillError)` - The first fetch or store failure; upserts
    ///   already issued are kept
    pub async fn ensure_fresh(&self, force: bool) -> Result<usize, BackfillError> {
        if !force && self.store.count_launches().await? > 0 {
            return Ok(0);
        }

        let _guard = self.flight.lock().await;

        if !force && self.store.count_launches().await? > 0 {
            return Ok(0);
        }

        info!(force, "Starting backfill");
        match self.refresh().await {
            Ok(processed) => {
                info!(processed, "Backfill complete");
                Ok(processed)
            }
            Err(e) => {
                error!(error = %e, "Backfill failed");
                Err(e)
            }
        }
    }

    async fn refresh(&self) -> Result<usize, BackfillError> {
        let rockets = self.source.fetch_rockets().await?;
        info!(count = rockets.len(), "Fetched rockets");

        let launchpads = self.source.fetch_launchpads().await?;
        info!(count = launchpads.len(), "Fetched launchpads");

        let raw_launches = self.source.fetch_launches().await?;
        info!(count = raw_launches.len(), "Fetched launches");

        let launches = normalize_launches(raw_launches, &rockets, &launchpads)?;

        self.store.upsert_rockets(&rockets).await?;
        self.store.upsert_launchpads(&launchpads).await?;
        self.store.upsert_launches(&launches).await?;

        Ok(launches.len())
    }
}
