//! In-process memo of loaded record sets.
//!
//! Keyed by resolved source location and row cap. Entries live until
//! [`RecordCache::clear`] or process exit; nothing is persisted. Concurrent
//! loads of the same key share one fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::Result;
use crate::records::LoadedRecords;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub location: String,
    pub row_limit: usize,
}

impl CacheKey {
    pub fn new(location: &str, row_limit: usize) -> Self {
        Self {
            location: location.to_string(),
            row_limit,
        }
    }
}

type Slot = Arc<OnceCell<Arc<LoadedRecords>>>;

#[derive(Debug, Default)]
pub struct RecordCache {
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<LoadedRecords>> {
        let hit = self
            .entries
            .lock()
            .await
            .get(key)
            .and_then(|slot| slot.get().cloned());
        debug!(location = %key.location, row_limit = key.row_limit, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Returns the cached records for `key`, running `load` only if no other
    /// caller has filled or is filling the slot. A failed load leaves the slot
    /// empty so the next call retries.
    pub async fn get_or_load<F, Fut>(&self, key: CacheKey, load: F) -> Result<Arc<LoadedRecords>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedRecords>>,
    {
        let slot = self.entries.lock().await.entry(key).or_default().clone();
        slot.get_or_try_init(|| async move { load().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub async fn insert(&self, key: CacheKey, loaded: Arc<LoadedRecords>) {
        let slot = Arc::new(OnceCell::new_with(Some(loaded)));
        self.entries.lock().await.insert(key, slot);
    }

    /// Number of filled entries.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
