//! Cached query service used by the HTTP layer

use crate::cache::ReadThroughCache;
use crate::data::Launch;
use crate::filter::LaunchFilter;
use crate::query::{QueryEngine, QueryError, Statistics};

/// Operation name under which launch listings are cached
pub const LIST_LAUNCHES_OP: &str = "list_launches";

/// Operation name under which the statistics bundle is cached
pub const ALL_STATISTICS_OP: &str = "all_statistics";

/// Query engine fronted by the read-through cache
#[derive(Clone)]
pub struct TrackerService {
    engine: QueryEngine,
    cache: ReadThroughCache,
}

impl TrackerService {
    /// Creates a service caching results for the cache's default TTL
    pub fn new(engine: QueryEngine, cache: ReadThroughCache) -> Self {
        Self { engine, cache }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    /// Lists launches matching `filter`, keyed in the cache by the filter
    pub async fn launches(&self, filter: &LaunchFilter) -> Result<Vec<Launch>, QueryError> {
        filter.validate()?;
        self.cache
            .get_or_compute_default(LIST_LAUNCHES_OP, filter, || {
                self.engine.list_launches(filter)
            })
            .await
    }

    /// Returns every statistics aggregate
    ///
    /// Aggregates of an empty store are returned but not cached, so they are
    /// recomputed once a backfill has populated it.
    pub async fn statistics(&self) -> Result<Statistics, QueryError> {
        self.cache
            .get_or_compute_if(
                ALL_STATISTICS_OP,
                &(),
                self.cache.default_ttl(),
                || self.engine.all_statistics(),
                |stats| !stats.is_empty(),
            )
            .await
    }
}
