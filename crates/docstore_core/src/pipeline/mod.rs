//! Asynchronous write pipeline between request handling and durable storage.
//!
//! # Responsibility
//! - Accept documents without blocking producers on storage I/O.
//! - Give every accepted document a retry before declaring it lost.
//! - Drain everything already accepted when shutdown is signaled.
//!
//! # Invariants
//! - Exactly one consumer task performs inserts; inserts never overlap.
//! - A terminal failure is always logged with the document id.
//! - A document id stays reserved from acceptance until its final attempt.

mod in_flight;
mod metrics;
mod write_pipeline;

pub use in_flight::InFlightIds;
pub use metrics::{PipelineMetrics, PipelineReport};
pub use write_pipeline::{spawn_pipeline, PipelineConfig, WritePipeline, WriteQueue};
