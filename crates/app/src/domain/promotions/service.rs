//! Promotions Service

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::info;
use vitrine::{
    channel::Channel,
    promotions::{PriceBase, PromotionalTable, PromotionalTableUuid},
};

use crate::{
    clock::Clock,
    domain::{
        products::{CatalogError, ProductsService},
        promotions::{data::NewPromotionalTable, repository::MemoryPromotionsRepository},
    },
};

pub struct MemoryPromotionsService {
    repository: MemoryPromotionsRepository,
    products: Arc<dyn ProductsService>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MemoryPromotionsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPromotionsService")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl MemoryPromotionsService {
    #[must_use]
    pub fn new(products: Arc<dyn ProductsService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository: MemoryPromotionsRepository::new(),
            products,
            clock,
        }
    }

    /// Table-level checks plus the ones that need the products: every
    /// product rule must point at a known product and a fixed amount must
    /// stay below the price it discounts.
    async fn validated(&self, table: NewPromotionalTable) -> Result<PromotionalTable, CatalogError> {
        let table = table.into_table(self.clock.now());

        table.validate()?;

        for rule in &table.product_discounts {
            let product = self
                .products
                .get_product(rule.product)
                .await
                .map_err(|error| match error {
                    CatalogError::NotFound => CatalogError::InvalidReference,
                    other => other,
                })?;

            let base = match rule.price_base {
                PriceBase::Current => product.current_price()?,
                PriceBase::Full => product.base_price,
            };

            rule.discount.validate_against(base)?;
        }

        Ok(table)
    }
}

#[async_trait]
impl PromotionsService for MemoryPromotionsService {
    #[tracing::instrument(
        name = "promotions.service.create_table",
        skip(self, table),
        fields(
            table_uuid = %table.uuid,
            priority = table.priority,
            product_rules = table.product_discounts.len()
        ),
        err
    )]
    async fn create_table(
        &self,
        table: NewPromotionalTable,
    ) -> Result<PromotionalTable, CatalogError> {
        let table = self.validated(table).await?;

        if !self.repository.insert(table.clone()) {
            return Err(CatalogError::AlreadyExists);
        }

        info!(table_uuid = %table.uuid, "created promotional table");

        Ok(table)
    }

    #[tracing::instrument(
        name = "promotions.service.update_table",
        skip(self, table),
        fields(table_uuid = %table.uuid),
        err
    )]
    async fn update_table(
        &self,
        table: NewPromotionalTable,
    ) -> Result<PromotionalTable, CatalogError> {
        let table = self.validated(table).await?;

        if !self.repository.replace(table.clone()) {
            return Err(CatalogError::NotFound);
        }

        info!("updated promotional table");

        Ok(table)
    }

    #[tracing::instrument(
        name = "promotions.service.set_active",
        skip(self),
        fields(table_uuid = %table),
        err
    )]
    async fn set_active(
        &self,
        table: PromotionalTableUuid,
        active: bool,
    ) -> Result<PromotionalTable, CatalogError> {
        let mut updated = self.repository.get(table).ok_or(CatalogError::NotFound)?;

        updated.is_active = active;
        updated.updated_at = self.clock.now();

        if !self.repository.replace(updated.clone()) {
            return Err(CatalogError::NotFound);
        }

        info!(active, "toggled promotional table");

        Ok(updated)
    }

    async fn get_table(&self, table: PromotionalTableUuid) -> Result<PromotionalTable, CatalogError> {
        self.repository.get(table).ok_or(CatalogError::NotFound)
    }

    async fn list_tables(&self) -> Vec<PromotionalTable> {
        let mut tables = self.repository.list();

        tables.sort_by(|left, right| right.outranks(left));

        tables
    }

    async fn tables_in_effect(&self, channel: Channel, now: Timestamp) -> Vec<PromotionalTable> {
        self.repository
            .list()
            .into_iter()
            .filter(|table| table.is_in_effect(channel, now))
            .collect()
    }
}

#[automock]
#[async_trait]
pub trait PromotionsService: Send + Sync {
    async fn create_table(&self, table: NewPromotionalTable)
    -> Result<PromotionalTable, CatalogError>;

    /// Replace every rule of an existing table, bumping `updated_at`.
    async fn update_table(&self, table: NewPromotionalTable)
    -> Result<PromotionalTable, CatalogError>;

    async fn set_active(
        &self,
        table: PromotionalTableUuid,
        active: bool,
    ) -> Result<PromotionalTable, CatalogError>;

    async fn get_table(&self, table: PromotionalTableUuid) -> Result<PromotionalTable, CatalogError>;

    /// Every table, highest ranked first.
    async fn list_tables(&self) -> Vec<PromotionalTable>;

    /// Tables active, inside their window and scoped to `channel` at `now`.
    async fn tables_in_effect(&self, channel: Channel, now: Timestamp) -> Vec<PromotionalTable>;
}
