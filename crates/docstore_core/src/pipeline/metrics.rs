//! Counters shared between the submitting handles and the consumer loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Documents accepted by `submit`.
    pub submitted: AtomicU64,
    /// Documents refused because the pipeline was already draining.
    pub rejected: AtomicU64,
    /// Successful inserts, whichever attempt landed them.
    pub persisted: AtomicU64,
    /// First attempts that failed and were queued for a retry.
    pub retried: AtomicU64,
    /// Documents given up on after their last attempt.
    pub failed: AtomicU64,
    /// Insert attempts made during the shutdown drain.
    pub drained: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> PipelineReport {
        PipelineReport {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub submitted: u64,
    pub rejected: u64,
    pub persisted: u64,
    pub retried: u64,
    pub failed: u64,
    pub drained: u64,
}
