//! Live Events Repository

use dashmap::{DashMap, mapref::entry::Entry};
use vitrine::{
    live::{LiveEvent, LiveEventUuid, LiveProduct},
    products::ProductUuid,
};

#[derive(Debug, Default)]
pub(crate) struct MemoryLiveEventsRepository {
    events: DashMap<LiveEventUuid, LiveEvent>,
    products: DashMap<(LiveEventUuid, ProductUuid), LiveProduct>,
}

impl MemoryLiveEventsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_event(&self, event: LiveEvent) -> bool {
        match self.events.entry(event.uuid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(event);

                true
            }
        }
    }

    pub(crate) fn event(&self, event: LiveEventUuid) -> Option<LiveEvent> {
        self.events.get(&event).map(|entry| entry.value().clone())
    }

    pub(crate) fn events(&self) -> Vec<LiveEvent> {
        self.events
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Apply `update` under the event's entry lock.
    pub(crate) fn update_event<E>(
        &self,
        event: LiveEventUuid,
        update: impl FnOnce(&mut LiveEvent) -> Result<(), E>,
    ) -> Option<Result<LiveEvent, E>> {
        let mut entry = self.events.get_mut(&event)?;

        Some(update(entry.value_mut()).map(|()| entry.value().clone()))
    }

    /// Insert or replace the attachment.
    pub(crate) fn upsert_product(&self, product: LiveProduct) {
        self.products.insert((product.event, product.product), product);
    }

    pub(crate) fn product(&self, event: LiveEventUuid, product: ProductUuid) -> Option<LiveProduct> {
        self.products
            .get(&(event, product))
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn products(&self) -> Vec<LiveProduct> {
        self.products
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
