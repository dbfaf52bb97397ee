//! Persistent document store
//!
//! Three collections of normalized documents (launches, rockets, launchpads),
//! each upserted by its natural id. [`SqliteStore`] persists them to disk;
//! [`MemoryStore`] keeps them in process for tests and ephemeral runs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::{Launch, Launchpad, Rocket};

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported a failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored document could not be encoded or decoded
    #[error("Failed to (de)serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker running the query panicked or was cancelled
    #[error("Store task failed: {0}")]
    Task(String),

    /// The store was used after being closed
    #[error("Store is closed")]
    Closed,
}

/// Predicate over launch documents
///
/// All present constraints are combined with logical AND; an empty query
/// matches every launch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchQuery {
    /// Inclusive bounds on the launch date
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Case-insensitive substring of the embedded rocket name
    pub rocket_name: Option<String>,
    pub success: Option<bool>,
    /// Case-insensitive substring of the embedded launchpad name
    pub launchpad: Option<String>,
}

impl LaunchQuery {
    /// Evaluates the predicate against a single launch
    ///
    /// A launch without a date never matches a date range, and a launch
    /// without an embedded rocket or launchpad never matches a name filter.
    pub fn matches(&self, launch: &Launch) -> bool {
        if let Some((start, end)) = self.date_range {
            match launch.date {
                Some(date) if date >= start && date <= end => {}
                _ => return false,
            }
        }

        if let Some(needle) = &self.rocket_name {
            let name = launch.rocket.as_ref().map(|r| r.name.as_str());
            if !contains_ignore_case(name, needle) {
                return false;
            }
        }

        if let Some(success) = self.success {
            if launch.success != Some(success) {
                return false;
            }
        }

        if let Some(needle) = &self.launchpad {
            let name = launch.launchpad.as_ref().map(|p| p.name.as_str());
            if !contains_ignore_case(name, needle) {
                return false;
            }
        }

        true
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Orders launches by date ascending (undated last), then by id
pub(crate) fn sort_launches(launches: &mut [Launch]) {
    launches.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// Storage operations over the three document collections
///
/// Upserts replace the whole document stored under the same id, so applying
/// the same batch twice leaves the store unchanged.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of stored launches
    async fn count_launches(&self) -> Result<usize, StoreError>;

    /// Inserts or replaces launches by id
    async fn upsert_launches(&self, launches: &[Launch]) -> Result<(), StoreError>;

    /// Inserts or replaces rockets by id
    async fn upsert_rockets(&self, rockets: &[Rocket]) -> Result<(), StoreError>;

    /// Inserts or replaces launchpads by id
    async fn upsert_launchpads(&self, launchpads: &[Launchpad]) -> Result<(), StoreError>;

    /// Returns launches matching `query`, ordered by date then id
    async fn find_launches(&self, query: &LaunchQuery) -> Result<Vec<Launch>, StoreError>;

    /// Returns every rocket, ordered by id
    async fn rockets(&self) -> Result<Vec<Rocket>, StoreError>;

    /// Returns every launchpad, ordered by id
    async fn launchpads(&self) -> Result<Vec<Launchpad>, StoreError>;

    /// Releases the underlying connection
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
