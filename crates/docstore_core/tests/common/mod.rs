#![allow(dead_code)]

use async_trait::async_trait;
use docstore_core::{
    AttributeInput, CreateDocumentRequest, Document, DocumentId, DocumentSearchQuery,
    DocumentStore, RepoError, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory `DocumentStore` with scripted failures and call counters.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentId, Document>>,
    pending_insert_failures: AtomicUsize,
    fail_fetches: AtomicBool,
    insert_delay: Option<Duration>,
    insert_attempts: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` inserts fail with a transient error.
    pub fn failing_inserts(count: usize) -> Self {
        let store = Self::new();
        store
            .pending_insert_failures
            .store(count, Ordering::SeqCst);
        store
    }

    /// Every insert sleeps for `delay` before touching the map.
    pub fn slow_inserts(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Makes every insert sleep for `delay` before it succeeds or fails.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn seed(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document);
    }

    pub fn stored(&self, id: DocumentId) -> Option<Document> {
        self.documents.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: &Document) -> StoreResult<()> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted_failure = self
            .pending_insert_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(StoreError::Unavailable("scripted insert failure".to_string()));
        }

        let mut documents = self.documents.lock().unwrap();
        if documents.contains_key(&document.id) {
            return Err(StoreError::Repo(RepoError::DuplicateId(document.id)));
        }
        for attribute in &document.attributes {
            let taken = documents
                .values()
                .flat_map(|stored| stored.attributes.iter())
                .any(|stored| stored.id == attribute.id);
            if taken {
                return Err(StoreError::Repo(RepoError::DuplicateAttributeId(attribute.id)));
            }
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn fetch_by_id(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted fetch failure".to_string()));
        }
        Ok(self.stored(id))
    }

    async fn search(&self, query: &DocumentSearchQuery) -> StoreResult<Vec<DocumentId>> {
        let documents = self.documents.lock().unwrap();
        let mut hits: Vec<&Document> = documents
            .values()
            .filter(|doc| query.start_timestamp.map_or(true, |start| doc.timestamp >= start))
            .filter(|doc| query.end_timestamp.map_or(true, |end| doc.timestamp <= end))
            .filter(|doc| {
                doc.attributes.iter().any(|attribute| {
                    query.key.as_deref().map_or(true, |key| attribute.key == key)
                        && query.value.as_deref().map_or(true, |value| attribute.value == value)
                })
            })
            .collect();
        hits.sort_by_key(|doc| (doc.timestamp, doc.id));
        Ok(hits
            .into_iter()
            .take(query.limit as usize)
            .map(|doc| doc.id)
            .collect())
    }
}

pub fn request(id: Option<DocumentId>, timestamp: &str, pairs: &[(&str, &str)]) -> CreateDocumentRequest {
    CreateDocumentRequest {
        id,
        timestamp: timestamp.to_string(),
        attributes: pairs
            .iter()
            .map(|(key, value)| AttributeInput::new(*key, *value))
            .collect(),
    }
}

/// A valid document with id `id` and a single `k=v` attribute.
pub fn document(id: DocumentId, timestamp: i64) -> Document {
    request(Some(id), &timestamp.to_string(), &[("k", "v")])
        .validate()
        .unwrap()
        .build(id)
}

/// Polls `check` until it holds, failing the test after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
