//! Ids of documents accepted for persistence but not yet settled.

use crate::model::document::DocumentId;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Reservation set shared by `WriteQueue` handles and the write loop.
///
/// Unlike the read-through cache it never evicts: an id stays reserved until
/// the pipeline has made its final insert attempt for that document.
#[derive(Debug, Default)]
pub struct InFlightIds {
    ids: Mutex<HashSet<DocumentId>>,
}

impl InFlightIds {
    /// Reserves `id`. Returns `false` if it is already reserved.
    pub fn reserve(&self, id: DocumentId) -> bool {
        self.lock().insert(id)
    }

    pub fn release(&self, id: DocumentId) {
        self.lock().remove(&id);
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<DocumentId>> {
        // Set operations cannot leave the set half-updated.
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
