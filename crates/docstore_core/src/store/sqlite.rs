//! `DocumentStore` over one shared SQLite connection.

use super::{DocumentStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory, DbResult, IN_MEMORY_PATH};
use crate::model::document::{Document, DocumentId};
use crate::repo::document_repo::{DocumentRepository, DocumentSearchQuery, SqliteDocumentRepository};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed store; calls are serialized on one connection and executed
/// on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens the database at `path`; `:memory:` selects an in-memory database.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == IN_MEMORY_PATH {
            open_db_in_memory()?
        } else {
            open_db(path)?
        };
        Ok(Self::new(conn))
    }

    async fn with_repo<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteDocumentRepository<'_>) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;
            work(&SqliteDocumentRepository::new(&guard))
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("blocking task failed: {err}")))?
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, document: &Document) -> StoreResult<()> {
        let document = document.clone();
        self.with_repo(move |repo| {
            repo.create_document(&document)?;
            Ok(())
        })
        .await
    }

    async fn fetch_by_id(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        self.with_repo(move |repo| Ok(repo.get_document(id)?)).await
    }

    async fn search(&self, query: &DocumentSearchQuery) -> StoreResult<Vec<DocumentId>> {
        let query = query.clone();
        self.with_repo(move |repo| Ok(repo.search_documents(&query)?))
            .await
    }
}
