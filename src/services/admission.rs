use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::domain::search_kind::SearchKind;

type AdmissionKey = (String, SearchKind);

/// Tracks which (user, kind) pairs have a search running. At most one slot
/// per key exists at any time.
#[derive(Clone, Default)]
pub struct AdmissionController {
    in_flight: Arc<Mutex<HashSet<AdmissionKey>>>,
}

/// Held for the lifetime of one search. Dropping it frees the key, whichever
/// way the search ended.
#[must_use = "the admission key is released as soon as the slot is dropped"]
pub struct AdmissionSlot {
    key: AdmissionKey,
    in_flight: Arc<Mutex<HashSet<AdmissionKey>>>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, user_id: &str, kind: SearchKind) -> Option<AdmissionSlot> {
        let key = (user_id.to_string(), kind);

        match lock(&self.in_flight).insert(key.clone()) {
            true => Some(AdmissionSlot {
                key,
                in_flight: Arc::clone(&self.in_flight),
            }),
            false => {
                log::warn!("Duplicate {} search blocked for user {}", kind, user_id);
                None
            }
        }
    }

    pub fn is_in_flight(&self, user_id: &str, kind: SearchKind) -> bool {
        lock(&self.in_flight).contains(&(user_id.to_string(), kind))
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

impl AdmissionSlot {
    pub fn user_id(&self) -> &str {
        &self.key.0
    }

    pub fn kind(&self) -> SearchKind {
        self.key.1
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
        log::info!(
            "Released {} search slot for user {}",
            self.key.1,
            self.key.0
        );
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock(set: &Mutex<HashSet<AdmissionKey>>) -> MutexGuard<'_, HashSet<AdmissionKey>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}
