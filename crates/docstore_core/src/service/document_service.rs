//! Document use-case service.
//!
//! # Responsibility
//! - Expose `create_document` / `retrieve_document` / `search_documents` to
//!   the request-handling layer.
//! - Wire creation into both the write pipeline and the read-through cache.
//!
//! # Invariants
//! - Creation succeeds once validation passes; persistence happens later.
//! - A read right after a create is served from the cache, even before the
//!   pipeline has persisted the document.
//! - A requested id that is in flight, cached or stored is never reused; the
//!   incoming document gets a freshly minted id instead.
//! - The pipeline's in-flight reservation is taken before the cache and
//!   store are checked, so eviction cannot hide an unsettled document.

use crate::cache::{CacheConfig, ReadThroughCache};
use crate::model::document::{
    CreateDocumentRequest, Document, DocumentId, DocumentValidationError,
};
use crate::pipeline::WriteQueue;
use crate::repo::document_repo::{DocumentSearchQuery, RepoError};
use crate::store::{DocumentStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to the request-handling layer.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before reaching the pipeline or cache.
    Validation(DocumentValidationError),
    /// Backing-store read failed (distinct from "not found").
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DocumentValidationError> for ServiceError {
    fn from(value: DocumentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Repo(RepoError::Validation(err)) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

/// Entry point for document use-cases. Clones share cache and queue.
pub struct DocumentService<S: DocumentStore> {
    cache: Arc<ReadThroughCache<S>>,
    queue: WriteQueue,
}

impl<S: DocumentStore> Clone for DocumentService<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            queue: self.queue.clone(),
        }
    }
}

impl<S: DocumentStore> DocumentService<S> {
    /// Creates a service writing through `queue` and reading through a new
    /// cache over `store`.
    pub fn new(store: Arc<S>, cache_config: CacheConfig, queue: WriteQueue) -> Self {
        Self {
            cache: Arc::new(ReadThroughCache::new(store, cache_config)),
            queue,
        }
    }

    pub fn cache(&self) -> &ReadThroughCache<S> {
        &self.cache
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    /// Validates `request`, hands the document to the pipeline and caches it.
    ///
    /// Returns the document as it will be persisted; its `id` differs from
    /// the requested one when that id was already taken.
    ///
    /// # Errors
    /// - `ServiceError::Validation` for malformed input. Nothing is enqueued.
    pub async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> ServiceResult<Arc<Document>> {
        let draft = request.validate()?;
        let mut id = draft.requested_id.unwrap_or_else(Uuid::new_v4);

        let document = loop {
            if self.queue.reserve(id) {
                if !self.is_taken(id).await {
                    let candidate = Arc::new(draft.build(id));
                    if self.cache.claim(Arc::clone(&candidate)) {
                        break candidate;
                    }
                }
                self.queue.release(id);
            }
            let fresh = Uuid::new_v4();
            info!(
                "event=document_create module=service status=ok action=reassign_id requested_id={id} document_id={fresh}"
            );
            id = fresh;
        };

        self.queue.submit(Document::clone(&document));
        info!(
            "event=document_create module=service status=ok document_id={} attributes={}",
            document.id,
            document.attributes.len()
        );
        Ok(document)
    }

    /// Looks `id` up through the cache, falling back to the store.
    ///
    /// `Ok(None)` does not tell "never created" apart from "created, not yet
    /// persisted and no longer cached".
    pub async fn retrieve_document(&self, id: DocumentId) -> ServiceResult<Option<Arc<Document>>> {
        if id.is_nil() {
            return Err(ServiceError::Validation(DocumentValidationError::InvalidId));
        }
        Ok(self.cache.get(id).await?)
    }

    /// Delegates a timestamp/attribute search to the store. Not cached.
    pub async fn search_documents(
        &self,
        query: &DocumentSearchQuery,
    ) -> ServiceResult<Vec<DocumentId>> {
        let query = query.normalized()?;
        Ok(self.cache.store().search(&query).await?)
    }

    /// Stops accepting new documents and lets the pipeline drain.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    async fn is_taken(&self, id: DocumentId) -> bool {
        match self.cache.get(id).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                // The primary key still rejects a real duplicate at insert time.
                warn!(
                    "event=document_create module=service status=error action=collision_check document_id={id} error={err}"
                );
                false
            }
        }
    }
}
