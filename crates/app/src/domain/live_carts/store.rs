//! Live bag storage.
//!
//! Lock order: a viewer's slot, then product gates, then bag locks one at a
//! time. Code holding a bag lock never takes a gate or a slot.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use vitrine::{live::LiveEventUuid, products::ProductUuid};

use crate::domain::{
    checkout::CheckoutStore,
    common::CustomerUuid,
    live_carts::records::{LiveCart, LiveCartUuid},
};

type Slot = Arc<Mutex<Option<LiveCartUuid>>>;

#[derive(Default)]
pub struct LiveCartStore {
    carts: CheckoutStore<LiveCart>,
    /// Current bag of each viewer per event
    slots: DashMap<(LiveEventUuid, CustomerUuid), Slot>,
    bag_numbers: DashMap<LiveEventUuid, u32>,
    by_event: DashMap<LiveEventUuid, Vec<LiveCartUuid>>,
    /// Serializes unit-limit checks per featured product
    gates: DashMap<(LiveEventUuid, ProductUuid), Arc<Mutex<()>>>,
}

impl fmt::Debug for LiveCartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCartStore")
            .field("carts", &self.carts)
            .field("events", &self.by_event.len())
            .finish_non_exhaustive()
    }
}

impl LiveCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn carts(&self) -> &CheckoutStore<LiveCart> {
        &self.carts
    }

    /// Lock the viewer's slot for `event`. While held, nobody else can open
    /// a bag for the same viewer and event.
    pub async fn claim_slot(
        &self,
        event: LiveEventUuid,
        customer: CustomerUuid,
    ) -> OwnedMutexGuard<Option<LiveCartUuid>> {
        let slot = Arc::clone(self.slots.entry((event, customer)).or_default().value());

        slot.lock_owned().await
    }

    /// Store a new bag under the next number of its event.
    pub fn open_bag(&self, mut cart: LiveCart) -> (u32, Arc<Mutex<LiveCart>>) {
        let bag_number = {
            let mut sequence = self.bag_numbers.entry(cart.event).or_insert(0);

            *sequence += 1;
            *sequence
        };

        cart.bag_number = bag_number;

        self.by_event.entry(cart.event).or_default().push(cart.uuid);

        (bag_number, self.carts.insert(cart))
    }

    /// Lock the gates of `products` in a fixed order.
    pub async fn lock_gates(
        &self,
        event: LiveEventUuid,
        products: impl IntoIterator<Item = ProductUuid>,
    ) -> Vec<OwnedMutexGuard<()>> {
        let mut products: Vec<ProductUuid> = products.into_iter().collect();

        products.sort();
        products.dedup();

        let mut guards = Vec::with_capacity(products.len());

        for product in products {
            let gate = Arc::clone(self.gates.entry((event, product)).or_default().value());

            guards.push(gate.lock_owned().await);
        }

        guards
    }

    pub fn event_carts(&self, event: LiveEventUuid) -> Vec<LiveCartUuid> {
        self.by_event
            .get(&event)
            .map(|carts| carts.value().clone())
            .unwrap_or_default()
    }

    /// Units of `product` holding stock across every bag of `event`. Locks
    /// the bags one at a time; callers must not hold a bag lock.
    pub async fn held_units(&self, event: LiveEventUuid, product: ProductUuid) -> u32 {
        let mut held = 0_u32;

        for uuid in self.event_carts(event) {
            if let Some(cart) = self.carts.get(uuid) {
                held = held.saturating_add(cart.lock().await.held_units(product));
            }
        }

        held
    }
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};
    use testresult::TestResult;

    use super::*;

    fn cart(event: LiveEventUuid) -> LiveCart {
        LiveCart::open(
            LiveCartUuid::new(),
            event,
            CustomerUuid::new(),
            0,
            SignedDuration::from_mins(30),
            Timestamp::UNIX_EPOCH,
        )
    }

    #[tokio::test]
    async fn bag_numbers_count_up_per_event() -> TestResult {
        let store = LiveCartStore::new();
        let first_event = LiveEventUuid::new();
        let second_event = LiveEventUuid::new();

        let (one, _) = store.open_bag(cart(first_event));
        let (two, bag) = store.open_bag(cart(first_event));
        let (other, _) = store.open_bag(cart(second_event));

        assert_eq!((one, two, other), (1, 2, 1));
        assert_eq!(bag.lock().await.bag_number, 2);
        assert_eq!(store.event_carts(first_event).len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn slot_is_exclusive_per_viewer_and_event() -> TestResult {
        let store = Arc::new(LiveCartStore::new());
        let event = LiveEventUuid::new();
        let customer = CustomerUuid::new();

        let mut slot = store.claim_slot(event, customer).await;

        *slot = Some(LiveCartUuid::new());

        let contender = {
            let store = Arc::clone(&store);

            tokio::spawn(async move { *store.claim_slot(event, customer).await })
        };

        tokio::task::yield_now().await;

        assert!(!contender.is_finished(), "second claim must wait for the slot");

        let expected = *slot;

        drop(slot);

        assert_eq!(contender.await?, expected);

        Ok(())
    }
}
