//! Stock Ledger Service
//!
//! The single choke point for stock mutation. Every change to a
//! `(product, size)` happens while holding that key's map entry, so the
//! availability check and the update can't interleave with another caller.

use async_trait::async_trait;
use dashmap::DashMap;
use mockall::automock;
use tracing::{info, warn};
use vitrine::{
    products::ProductUuid,
    stock::{Size, StockError, StockKey, StockLevel},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLevel {
    pub size: Size,
    pub level: StockLevel,
}

#[derive(Debug, Default)]
pub struct MemoryStockLedger {
    levels: DashMap<StockKey, StockLevel>,
}

impl MemoryStockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_positive(quantity: u32) -> Result<(), StockError> {
    if quantity == 0 {
        return Err(StockError::InvalidQuantity);
    }

    Ok(())
}

#[async_trait]
impl StockLedger for MemoryStockLedger {
    async fn available(&self, product: ProductUuid, size: Size) -> u32 {
        self.levels
            .get(&StockKey::new(product, size))
            .map_or(0, |level| level.available())
    }

    async fn levels(&self, product: ProductUuid) -> Vec<SizeLevel> {
        let mut levels: Vec<SizeLevel> = self
            .levels
            .iter()
            .filter(|entry| entry.key().product == product)
            .map(|entry| SizeLevel {
                size: entry.key().size.clone(),
                level: *entry.value(),
            })
            .collect();

        levels.sort_by(|left, right| left.size.cmp(&right.size));

        levels
    }

    async fn commit(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError> {
        ensure_positive(quantity)?;

        let key = StockKey::new(product, size);

        let Some(mut level) = self.levels.get_mut(&key) else {
            return Err(StockError::InsufficientStock {
                product: key.product,
                size: key.size,
                requested: quantity,
                available: 0,
            });
        };

        level.commit(&key, quantity)?;

        Ok(*level)
    }

    async fn release(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError> {
        ensure_positive(quantity)?;

        let key = StockKey::new(product, size);

        let Some(mut level) = self.levels.get_mut(&key) else {
            warn!(stock_key = %key, quantity, "released stock for an unknown size");

            return Ok(StockLevel::default());
        };

        let released = level.release(quantity);

        if released < quantity {
            warn!(
                stock_key = %key,
                requested = quantity,
                released,
                "released more stock than was committed; clamped at zero"
            );
        }

        Ok(*level)
    }

    async fn settle(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError> {
        ensure_positive(quantity)?;

        let key = StockKey::new(product, size);

        let Some(mut level) = self.levels.get_mut(&key) else {
            return Err(StockError::NotCommitted {
                product: key.product,
                size: key.size,
                requested: quantity,
                committed: 0,
            });
        };

        level.settle(&key, quantity)?;

        Ok(*level)
    }

    async fn decrement_permanently(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError> {
        ensure_positive(quantity)?;

        let key = StockKey::new(product, size);

        let Some(mut level) = self.levels.get_mut(&key) else {
            return Err(StockError::InsufficientStock {
                product: key.product,
                size: key.size,
                requested: quantity,
                available: 0,
            });
        };

        level.decrement(&key, quantity)?;

        Ok(*level)
    }

    async fn set_on_hand(
        &self,
        product: ProductUuid,
        size: Size,
        on_hand: u32,
    ) -> Result<StockLevel, StockError> {
        let key = StockKey::new(product, size);
        let mut level = self.levels.entry(key.clone()).or_default();

        level.set_on_hand(&key, on_hand)?;

        info!(stock_key = %key, on_hand, "set on-hand stock");

        Ok(*level)
    }
}

#[automock]
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn available(&self, product: ProductUuid, size: Size) -> u32;

    /// Per-size snapshot, ordered by size label.
    async fn levels(&self, product: ProductUuid) -> Vec<SizeLevel>;

    /// Hold units for a reservation, atomically with the availability check.
    async fn commit(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError>;

    /// Give held units back. Clamps at zero and logs instead of going negative.
    async fn release(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError>;

    /// Turn held units into a permanent decrement in one step.
    async fn settle(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError>;

    /// Remove unheld units, e.g. for an off-platform sale.
    async fn decrement_permanently(
        &self,
        product: ProductUuid,
        size: Size,
        quantity: u32,
    ) -> Result<StockLevel, StockError>;

    /// Replace the physical count from a stock take or import.
    async fn set_on_hand(
        &self,
        product: ProductUuid,
        size: Size,
        on_hand: u32,
    ) -> Result<StockLevel, StockError>;
}
