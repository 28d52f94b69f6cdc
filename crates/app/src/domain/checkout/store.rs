//! In-memory checkout storage.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::{checkout::Reservable, live_carts::LiveCartStore, orders::OrderStore};

/// Checkouts of one kind, each behind its own lock so work on one order or
/// bag never waits on another.
pub struct CheckoutStore<T: Reservable> {
    entries: DashMap<T::Uuid, Arc<Mutex<T>>>,
}

impl<T: Reservable> fmt::Debug for CheckoutStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<T: Reservable> Default for CheckoutStore<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: Reservable> CheckoutStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, checkout: T) -> Arc<Mutex<T>> {
        let uuid = checkout.uuid();
        let entry = Arc::new(Mutex::new(checkout));

        self.entries.insert(uuid, Arc::clone(&entry));

        entry
    }

    /// The checkout's lock handle. The map guard is dropped before return.
    pub fn get(&self, uuid: T::Uuid) -> Option<Arc<Mutex<T>>> {
        self.entries.get(&uuid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn uuids(&self) -> Vec<T::Uuid> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both checkout stores, shared by the orchestrator, payments and the sweeper.
#[derive(Debug, Clone, Default)]
pub struct Checkouts {
    pub orders: Arc<OrderStore>,
    pub live_carts: Arc<LiveCartStore>,
}

impl Checkouts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
