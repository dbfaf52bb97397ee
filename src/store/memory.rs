//! In-process document store

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{sort_launches, DocumentStore, LaunchQuery, StoreError};
use crate::data::{Launch, Launchpad, Rocket};

/// Document store backed by in-memory maps keyed by id
#[derive(Debug, Default)]
pub struct MemoryStore {
    launches: RwLock<BTreeMap<String, Launch>>,
    rockets: RwLock<BTreeMap<String, Rocket>>,
    launchpads: RwLock<BTreeMap<String, Launchpad>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count_launches(&self) -> Result<usize, StoreError> {
        self.check_open()?;
        Ok(self.launches.read().len())
    }

    async fn upsert_launches(&self, launches: &[Launch]) -> Result<(), StoreError> {
        self.check_open()?;
        let mut map = self.launches.write();
        for launch in launches {
            map.insert(launch.id.clone(), launch.clone());
        }
        Ok(())
    }

    async fn upsert_rockets(&self, rockets: &[Rocket]) -> Result<(), StoreError> {
        self.check_open()?;
        let mut map = self.rockets.write();
        for rocket in rockets {
            map.insert(rocket.id.clone(), rocket.clone());
        }
        Ok(())
    }

    async fn upsert_launchpads(&self, launchpads: &[Launchpad]) -> Result<(), StoreError> {
        self.check_open()?;
        let mut map = self.launchpads.write();
        for pad in launchpads {
            map.insert(pad.id.clone(), pad.clone());
        }
        Ok(())
    }

    async fn find_launches(&self, query: &LaunchQuery) -> Result<Vec<Launch>, StoreError> {
        self.check_open()?;
        let mut found: Vec<Launch> = self
            .launches
            .read()
            .values()
            .filter(|launch| query.matches(launch))
            .cloned()
            .collect();
        sort_launches(&mut found);
        Ok(found)
    }

    async fn rockets(&self) -> Result<Vec<Rocket>, StoreError> {
        self.check_open()?;
        Ok(self.rockets.read().values().cloned().collect())
    }

    async fn launchpads(&self) -> Result<Vec<Launchpad>, StoreError> {
        self.check_open()?;
        Ok(self.launchpads.read().values().cloned().collect())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
