//! In-flight reservations.
//!
//! A key is reserved while some fetch owns it. Reservation is the only
//! thing that keeps overlapping fetches from asking relays for the same key.

use std::collections::{BTreeSet, HashSet};

use profile_types::PublicKey;

use crate::store::ProfileStore;

/// Set of public keys currently being fetched.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    reserved: HashSet<PublicKey>,
}

impl InFlightTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a key unless it is already reserved or already resolved.
    ///
    /// Returns `true` if this call took the reservation.
    pub fn try_reserve(&mut self, key: &PublicKey, store: &ProfileStore) -> bool {
        if store.contains(key) {
            return false;
        }
        self.reserved.insert(key.clone())
    }

    /// Reserve every eligible key and return the ones this call now owns.
    pub fn claim<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a PublicKey>,
        store: &ProfileStore,
    ) -> BTreeSet<PublicKey> {
        keys.into_iter()
            .filter(|key| self.try_reserve(key, store))
            .cloned()
            .collect()
    }

    /// Drop a reservation. No-op if the key is not reserved.
    pub fn release(&mut self, key: &PublicKey) {
        self.reserved.remove(key);
    }

    /// Whether the key is reserved.
    pub fn is_reserved(&self, key: &PublicKey) -> bool {
        self.reserved.contains(key)
    }

    /// Number of reserved keys.
    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    /// Whether nothing is reserved.
    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }
}
