//! Entity model shared by the store, pipeline and cache.
//!
//! # Responsibility
//! - Define the `Document`/`Attribute` shapes persisted by the backing store.
//! - Own the validation rules applied before a document enters the core.
//!
//! # Invariants
//! - A `DocumentId` is never reused for two different documents.
//! - A document always owns at least one attribute.

pub mod attribute;
pub mod document;
