//! Read-side queries over the persistent store
//!
//! Launch listings trigger a lazy backfill when the store is empty; the
//! statistics aggregates read whatever the store currently holds.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backfill::{BackfillCoordinator, BackfillError};
use crate::data::Launch;
use crate::filter::{FilterError, LaunchFilter};
use crate::store::{DocumentStore, LaunchQuery, StoreError};

/// Errors returned by query operations
#[derive(Debug, Error)]
pub enum QueryError {
    /// The supplied filter was rejected
    #[error(transparent)]
    Invalid(#[from] FilterError),

    /// The lazy backfill before a listing failed
    #[error("{0}")]
    Backfill(#[from] BackfillError),

    #[error("{0}")]
    Store(#[from] StoreError),

    /// The background backfill task panicked or was cancelled
    #[error("Backfill task failed: {0}")]
    Task(String),
}

/// Launch counters for a single launchpad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchpadTotals {
    pub full_name: Option<String>,
    pub launch_attempts: u32,
    pub launch_successes: u32,
}

/// Number of dated launches per calendar month and year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFrequency {
    /// Keyed by `YYYY-MM`
    #[serde(rename = "monthly_launch_frequency")]
    pub monthly: BTreeMap<String, u32>,
    #[serde(rename = "yearly_launch_frequency")]
    pub yearly: BTreeMap<i32, u32>,
}

/// All statistics aggregates, computed from a single store snapshot per aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub rocket_success_rates: BTreeMap<String, f64>,
    pub launchpad_totals: BTreeMap<String, LaunchpadTotals>,
    pub launch_frequency: LaunchFrequency,
}

impl Statistics {
    /// True when every aggregate is empty, as for a store never backfilled
    pub fn is_empty(&self) -> bool {
        self.rocket_success_rates.is_empty()
            && self.launchpad_totals.is_empty()
            && self.launch_frequency.monthly.is_empty()
            && self.launch_frequency.yearly.is_empty()
    }
}

/// Answers listing and statistics queries
#[derive(Clone)]
pub struct QueryEngine {
    backfill: Arc<BackfillCoordinator>,
    store: Arc<dyn DocumentStore>,
}

impl QueryEngine {
    pub fn new(backfill: Arc<BackfillCoordinator>) -> Self {
        let store = backfill.store().clone();
        Self { backfill, store }
    }

    /// Lists launches matching `filter`, ordered by date then id
    ///
    /// Populates the store first if it is empty. The backfill runs on its own
    /// task so it completes even if the caller is dropped.
    pub async fn list_launches(&self, filter: &LaunchFilter) -> Result<Vec<Launch>, QueryError> {
        filter.validate()?;

        let backfill = self.backfill.clone();
        tokio::spawn(async move { backfill.ensure_fresh(false).await })
            .await
            .map_err(|e| QueryError::Task(e.to_string()))??;

        let query: LaunchQuery = filter.to_query();
        let launches = self.store.find_launches(&query).await?;
        debug!(count = launches.len(), ?filter, "Listed launches");
        Ok(launches)
    }

    /// Success percentage per rocket name; rockets without a rate are left out
    pub async fn rocket_success_rates(&self) -> Result<BTreeMap<String, f64>, QueryError> {
        let rockets = self.store.rockets().await?;
        Ok(rockets
            .into_iter()
            .filter_map(|rocket| rocket.success_rate_pct.map(|rate| (rocket.name, rate)))
            .collect())
    }

    /// Attempt and success counters per launchpad name; missing counts read as 0
    pub async fn launchpad_totals(&self) -> Result<BTreeMap<String, LaunchpadTotals>, QueryError> {
        let launchpads = self.store.launchpads().await?;
        Ok(launchpads
            .into_iter()
            .map(|pad| {
                let totals = LaunchpadTotals {
                    full_name: pad.full_name,
                    launch_attempts: pad.launch_attempts.unwrap_or(0),
                    launch_successes: pad.launch_successes.unwrap_or(0),
                };
                (pad.name, totals)
            })
            .collect())
    }

    /// Launch counts per month and per year, skipping undated launches
    pub async fn launch_frequency(&self) -> Result<LaunchFrequency, QueryError> {
        let launches = self.store.find_launches(&LaunchQuery::default()).await?;
        Ok(count_frequency(&launches))
    }

    /// Computes every aggregate concurrently; fails if any one of them fails
    pub async fn all_statistics(&self) -> Result<Statistics, QueryError> {
        let (rocket_success_rates, launchpad_totals, launch_frequency) = futures::try_join!(
            self.rocket_success_rates(),
            self.launchpad_totals(),
            self.launch_frequency(),
        )?;

        Ok(Statistics {
            rocket_success_rates,
            launchpad_totals,
            launch_frequency,
        })
    }
}

fn count_frequency(launches: &[Launch]) -> LaunchFrequency {
    let mut frequency = LaunchFrequency::default();
    for date in launches.iter().filter_map(|launch| launch.date) {
        *frequency
            .monthly
            .entry(date.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        *frequency.yearly.entry(date.year()).or_insert(0) += 1;
    }
    frequency
}
