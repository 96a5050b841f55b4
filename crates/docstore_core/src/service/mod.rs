//! Use-case services consumed by the request-handling layer.
//!
//! # Responsibility
//! - Compose validation, write pipeline and read-through cache.
//! - Keep callers unaware of storage and concurrency details.

pub mod document_service;
