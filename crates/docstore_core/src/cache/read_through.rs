//! `moka`-backed read-through cache keyed by document id.

use crate::model::document::{Document, DocumentId};
use crate::store::{DocumentStore, StoreResult};
use log::{debug, error};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Total cost budget when none is configured.
pub const DEFAULT_CACHE_MAX_COST: u64 = 100;

const ENTRY_WEIGHT: u32 = 1;

/// Capacity and expiry settings for [`ReadThroughCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Sum of entry weights the cache may hold.
    pub max_cost: u64,
    /// Optional expiry after insertion. Capacity pressure alone evicts when unset.
    pub time_to_live: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_CACHE_MAX_COST,
            time_to_live: None,
        }
    }
}

impl CacheConfig {
    pub fn with_max_cost(mut self, max_cost: u64) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

/// Read-through cache over a [`DocumentStore`].
///
/// Safe to share between tasks; all synchronization is internal.
pub struct ReadThroughCache<S: DocumentStore> {
    store: Arc<S>,
    entries: Cache<DocumentId, Arc<Document>>,
}

impl<S: DocumentStore> ReadThroughCache<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_cost)
            .weigher(|_id: &DocumentId, _document: &Arc<Document>| ENTRY_WEIGHT)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|id, _document, cause| {
                debug!("event=cache_evict module=cache status=ok document_id={id} cause={cause:?}");
            });
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        Self {
            store,
            entries: builder.build(),
        }
    }

    /// Returns the document for `id`, reading the store on a miss.
    ///
    /// # Returns
    /// - `Ok(Some(_))` from the cache or from a store read that back-filled it.
    /// - `Ok(None)` when neither the cache nor the store knows `id`.
    /// - `Err(_)` when the store read itself failed.
    pub async fn get(&self, id: DocumentId) -> StoreResult<Option<Arc<Document>>> {
        if let Some(document) = self.entries.get(&id) {
            debug!("event=cache_get module=cache status=ok result=hit document_id={id}");
            return Ok(Some(document));
        }

        match self.store.fetch_by_id(id).await {
            Ok(Some(document)) => {
                debug!("event=cache_get module=cache status=ok result=fill document_id={id}");
                let document = Arc::new(document);
                self.entries.insert(id, Arc::clone(&document));
                Ok(Some(document))
            }
            Ok(None) => {
                debug!("event=cache_get module=cache status=ok result=not_found document_id={id}");
                Ok(None)
            }
            Err(err) => {
                error!("event=cache_get module=cache status=error document_id={id} error={err}");
                Err(err)
            }
        }
    }

    /// Inserts or replaces the entry for `document.id`.
    pub fn put(&self, document: Arc<Document>) {
        self.entries.insert(document.id, document);
    }

    /// Inserts `document` only if its id has no entry yet.
    ///
    /// Returns `false` when another document already holds the id.
    pub fn claim(&self, document: Arc<Document>) -> bool {
        self.entries
            .entry(document.id)
            .or_insert_with(|| Arc::clone(&document))
            .is_fresh()
    }

    /// Cache-only lookup; never touches the store.
    pub fn peek(&self, id: DocumentId) -> Option<Arc<Document>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn invalidate(&self, id: DocumentId) {
        self.entries.invalidate(&id);
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Applies pending admissions and evictions right away.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
