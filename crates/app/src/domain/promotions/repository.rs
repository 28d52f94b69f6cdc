//! Promotional Tables Repository

use dashmap::{DashMap, mapref::entry::Entry};
use vitrine::promotions::{PromotionalTable, PromotionalTableUuid};

#[derive(Debug, Default)]
pub(crate) struct MemoryPromotionsRepository {
    tables: DashMap<PromotionalTableUuid, PromotionalTable>,
}

impl MemoryPromotionsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, table: PromotionalTable) -> bool {
        match self.tables.entry(table.uuid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(table);

                true
            }
        }
    }

    pub(crate) fn replace(&self, table: PromotionalTable) -> bool {
        match self.tables.get_mut(&table.uuid) {
            Some(mut entry) => {
                *entry = table;

                true
            }
            None => false,
        }
    }

    pub(crate) fn get(&self, table: PromotionalTableUuid) -> Option<PromotionalTable> {
        self.tables.get(&table).map(|entry| entry.value().clone())
    }

    pub(crate) fn list(&self) -> Vec<PromotionalTable> {
        self.tables
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
