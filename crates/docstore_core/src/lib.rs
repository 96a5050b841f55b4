//! Core of the time-series document store.
//!
//! Owns the entity model, the asynchronous write pipeline, the read-through
//! cache and the SQLite backing store they sit in front of.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod service;
pub mod store;

pub use cache::{CacheConfig, ReadThroughCache};
pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{Attribute, AttributeId, AttributeValidationError};
pub use model::document::{
    parse_timestamp, AttributeInput, CreateDocumentRequest, Document, DocumentId,
    DocumentValidationError,
};
pub use pipeline::{spawn_pipeline, PipelineConfig, PipelineReport, WritePipeline, WriteQueue};
pub use repo::document_repo::{
    DocumentRepository, DocumentSearchQuery, RepoError, RepoResult, SqliteDocumentRepository,
};
pub use service::document_service::{DocumentService, ServiceError, ServiceResult};
pub use store::{DocumentStore, SqliteDocumentStore, StoreError, StoreResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
