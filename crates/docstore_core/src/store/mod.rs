//! Async backing-store seam consumed by the write pipeline and the cache.
//!
//! # Responsibility
//! - Define the `insert`/`fetch_by_id` contract the core depends on.
//! - Adapt the synchronous SQLite repository to async callers.
//!
//! # Invariants
//! - `fetch_by_id` distinguishes "not found" (`Ok(None)`) from failure.
//! - SQLite work never runs on an async worker thread.

mod sqlite;

pub use sqlite::SqliteDocumentStore;

use crate::model::document::{Document, DocumentId};
use crate::repo::document_repo::{DocumentSearchQuery, RepoError};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of one backing-store call.
#[derive(Debug)]
pub enum StoreError {
    Repo(RepoError),
    /// The call did not finish within the configured deadline.
    Timeout(Duration),
    /// The backend could not run the call at all.
    Unavailable(String),
}

impl StoreError {
    /// Whether another attempt with the same document can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Repo(
                RepoError::DuplicateId(_)
                    | RepoError::DuplicateAttributeId(_)
                    | RepoError::Validation(_)
            )
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Timeout(limit) => write!(f, "store call timed out after {}ms", limit.as_millis()),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Timeout(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Durable storage operations used by the core.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Persists `document`; fails with `RepoError::DuplicateId` if the id
    /// exists and `RepoError::DuplicateAttributeId` if an attribute id does.
    async fn insert(&self, document: &Document) -> StoreResult<()>;

    /// Reads one document by id.
    async fn fetch_by_id(&self, id: DocumentId) -> StoreResult<Option<Document>>;

    /// Returns ids of documents matching `query`.
    async fn search(&self, query: &DocumentSearchQuery) -> StoreResult<Vec<DocumentId>>;
}
