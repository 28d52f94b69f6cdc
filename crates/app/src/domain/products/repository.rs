//! Products Repository

use dashmap::{DashMap, mapref::entry::Entry};
use vitrine::products::{Product, ProductUuid};

#[derive(Debug, Default)]
pub(crate) struct MemoryProductsRepository {
    products: DashMap<ProductUuid, Product>,
}

impl MemoryProductsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the uuid is taken.
    pub(crate) fn insert(&self, product: Product) -> bool {
        match self.products.entry(product.uuid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(product);

                true
            }
        }
    }

    pub(crate) fn get(&self, product: ProductUuid) -> Option<Product> {
        self.products.get(&product).map(|entry| entry.value().clone())
    }

    /// Every product, ordered by name.
    pub(crate) fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        products.sort_by(|left, right| left.name.cmp(&right.name).then(left.uuid.cmp(&right.uuid)));

        products
    }

    /// Apply `update` to a copy and store it only if `update` succeeds.
    pub(crate) fn update<E>(
        &self,
        product: ProductUuid,
        update: impl FnOnce(&mut Product) -> Result<(), E>,
    ) -> Option<Result<Product, E>> {
        let mut entry = self.products.get_mut(&product)?;
        let mut updated = entry.value().clone();

        if let Err(error) = update(&mut updated) {
            return Some(Err(error));
        }

        *entry = updated.clone();

        Some(Ok(updated))
    }
}
