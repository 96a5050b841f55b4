//! Repository layer over the relational backing store.
//!
//! # Responsibility
//! - Keep SQL behind a synchronous, connection-scoped contract.
//! - Return semantic errors (`DuplicateId`) next to transport errors.

pub mod document_repo;
