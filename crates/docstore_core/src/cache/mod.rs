//! Bounded read-through cache in front of the backing store.
//!
//! # Responsibility
//! - Serve recently created or recently read documents without a store read.
//! - Fall back to the store on a miss and keep the fetched value.
//!
//! # Invariants
//! - Only documents that were created through the service or read from the
//!   store are ever cached.
//! - Cached documents are shared immutably (`Arc<Document>`); callers never
//!   observe each other's mutations.
//! - Eviction is capacity driven; every entry weighs the same.

mod read_through;

pub use read_through::{CacheConfig, ReadThroughCache, DEFAULT_CACHE_MAX_COST};
