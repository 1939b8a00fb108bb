//! Memoization of final dataset responses.
//!
//! Responses are keyed by `(dataset_id, QuerySignature)`. The cache never
//! fails a query: read errors count as misses and writes happen in the
//! background with failures only logged. Short-lived callers use
//! [`ResponseCache::flush`] to wait for pending writes before exiting.
//!
//! | Store | Layout |
//! |-------|--------|
//! | [`FileCacheStore`] | JSON blobs plus a JSON index per dataset under a root directory |
//! | [`MemoryCacheStore`] | process-local map |

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::query::orchestrator::DatasetResponse;

pub mod key;
pub mod store;

pub use key::QuerySignature;
pub use store::{CacheError, CacheStore, FileCacheStore, MemoryCacheStore};

/// Typed, failure-tolerant front of a [`CacheStore`]
#[derive(Clone, Default)]
pub struct ResponseCache {
    store: Option<Arc<dyn CacheStore>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            pending: Arc::default(),
        }
    }

    /// A cache that always misses and never stores
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Look up a stored response. Any failure is logged and reported as a miss.
    pub async fn get(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
    ) -> Option<DatasetResponse> {
        let store = self.store.clone()?;
        let id = dataset_id.to_string();
        let key = signature.clone();

        let blob = match tokio::task::spawn_blocking(move || store.get(&id, &key)).await {
            Ok(Ok(Some(blob))) => blob,
            Ok(Ok(None)) => {
                debug!("Cache miss for {dataset_id} [{signature}]");
                return None;
            }
            Ok(Err(e)) => {
                warn!("Cache read failed for {dataset_id}, treating as miss: {e}");
                return None;
            }
            Err(e) => {
                warn!("Cache read task failed for {dataset_id}, treating as miss: {e}");
                return None;
            }
        };

        match serde_json::from_slice(&blob) {
            Ok(response) => {
                debug!("Cache hit for {dataset_id} [{signature}]");
                Some(response)
            }
            Err(e) => {
                warn!("Cached response for {dataset_id} is unreadable, treating as miss: {e}");
                None
            }
        }
    }

    /// Store a response in the background.
    ///
    /// Returns whether a write was started. Failures are logged, never
    /// returned. Must be called from within a tokio runtime.
    pub fn put(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
        response: &DatasetResponse,
    ) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        let blob = match serde_json::to_vec(response) {
            Ok(blob) => blob,
            Err(e) => {
                error!("Failed to serialize response for {dataset_id}: {e}");
                return false;
            }
        };
        let id = dataset_id.to_string();
        let key = signature.clone();

        let handle = tokio::task::spawn_blocking(move || match store.put(&id, &key, &blob) {
            Ok(()) => debug!("Cached response for {id} [{key}]"),
            Err(e) => error!("Failed to cache response for {id}: {e}"),
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
        true
    }

    /// Wait for every background write started so far
    pub async fn flush(&self) {
        let handles = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Cache write task failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
