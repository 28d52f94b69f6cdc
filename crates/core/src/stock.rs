//! Stock
//!
//! Per `(product, size)` stock arithmetic. `on_hand` is the physical count,
//! `committed` is what active reservations hold; `available` is the
//! difference and never goes below zero.

use std::fmt;

use thiserror::Error;

use crate::products::ProductUuid;

/// At or below this many available units a size is reported as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 2;

/// Size label, normalised to trimmed upper case (`" m "` and `"M"` are the same size).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Size(String);

impl Size {
    /// Normalise a size label.
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_uppercase())
    }

    /// The normalised label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Size {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    /// Product
    pub product: ProductUuid,

    /// Size
    pub size: Size,
}

impl StockKey {
    /// Build a key.
    pub fn new(product: ProductUuid, size: Size) -> Self {
        Self { product, size }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product, self.size)
    }
}

/// Stock errors. Propagated unchanged up to the checkout orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockError {
    /// Zero quantity requested.
    #[error("quantity must be a positive integer")]
    InvalidQuantity,

    /// Not enough units available to commit or decrement.
    #[error("insufficient stock for {product} size {size}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product
        product: ProductUuid,

        /// Size
        size: Size,

        /// Units asked for
        requested: u32,

        /// Units that were available
        available: u32,
    },

    /// Settling more units than are committed.
    #[error("cannot settle {requested} units of {product} size {size}: only {committed} committed")]
    NotCommitted {
        /// Product
        product: ProductUuid,

        /// Size
        size: Size,

        /// Units asked for
        requested: u32,

        /// Units currently committed
        committed: u32,
    },

    /// Stock count below what reservations already hold.
    #[error("cannot set {product} size {size} to {requested} units: {committed} are committed")]
    BelowCommitted {
        /// Product
        product: ProductUuid,

        /// Size
        size: Size,

        /// Requested on-hand count
        requested: u32,

        /// Units currently committed
        committed: u32,
    },
}

/// Stock counters for a single `(product, size)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockLevel {
    on_hand: u32,
    committed: u32,
}

impl StockLevel {
    /// A level with nothing committed.
    pub const fn new(on_hand: u32) -> Self {
        Self {
            on_hand,
            committed: 0,
        }
    }

    /// Physical units.
    pub const fn on_hand(&self) -> u32 {
        self.on_hand
    }

    /// Units held by active reservations.
    pub const fn committed(&self) -> u32 {
        self.committed
    }

    /// Units free to reserve.
    pub const fn available(&self) -> u32 {
        self.on_hand.saturating_sub(self.committed)
    }

    /// Whether the size is running out (but not yet sold out).
    pub const fn is_low(&self) -> bool {
        let available = self.available();

        available > 0 && available <= LOW_STOCK_THRESHOLD
    }

    /// Hold `quantity` units.
    ///
    /// # Errors
    ///
    /// [`StockError::InsufficientStock`] when fewer than `quantity` units are available.
    pub fn commit(&mut self, key: &StockKey, quantity: u32) -> Result<(), StockError> {
        let available = self.available();

        if quantity > available {
            return Err(insufficient(key, quantity, available));
        }

        self.committed += quantity;

        Ok(())
    }

    /// Release up to `quantity` held units. Returns how many were actually
    /// released; anything beyond the committed count is clamped away.
    pub fn release(&mut self, quantity: u32) -> u32 {
        let released = quantity.min(self.committed);

        self.committed -= released;

        released
    }

    /// Turn `quantity` held units into a permanent decrement.
    ///
    /// # Errors
    ///
    /// [`StockError::NotCommitted`] when fewer than `quantity` units are held.
    pub fn settle(&mut self, key: &StockKey, quantity: u32) -> Result<(), StockError> {
        if quantity > self.committed || quantity > self.on_hand {
            return Err(StockError::NotCommitted {
                product: key.product,
                size: key.size.clone(),
                requested: quantity,
                committed: self.committed,
            });
        }

        self.committed -= quantity;
        self.on_hand -= quantity;

        Ok(())
    }

    /// Permanently remove `quantity` unheld units.
    ///
    /// # Errors
    ///
    /// [`StockError::InsufficientStock`] when fewer than `quantity` units are available.
    pub fn decrement(&mut self, key: &StockKey, quantity: u32) -> Result<(), StockError> {
        let available = self.available();

        if quantity > available {
            return Err(insufficient(key, quantity, available));
        }

        self.on_hand -= quantity;

        Ok(())
    }

    /// Replace the physical count, e.g. after a stock take.
    ///
    /// # Errors
    ///
    /// [`StockError::BelowCommitted`] when `on_hand` is below the committed count.
    pub fn set_on_hand(&mut self, key: &StockKey, on_hand: u32) -> Result<(), StockError> {
        if on_hand < self.committed {
            return Err(StockError::BelowCommitted {
                product: key.product,
                size: key.size.clone(),
                requested: on_hand,
                committed: self.committed,
            });
        }

        self.on_hand = on_hand;

        Ok(())
    }
}

fn insufficient(key: &StockKey, requested: u32, available: u32) -> StockError {
    StockError::InsufficientStock {
        product: key.product,
        size: key.size.clone(),
        requested,
        available,
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn key() -> StockKey {
        StockKey::new(ProductUuid::new(), Size::new("m"))
    }

    #[test]
    fn sizes_are_normalised() {
        assert_eq!(Size::new(" gg "), Size::from("GG"));
        assert_eq!(Size::new("p").as_str(), "P");
    }

    #[test]
    fn commit_reduces_availability() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(3);

        level.commit(&key, 2)?;

        assert_eq!(level.available(), 1);
        assert_eq!(level.committed(), 2);
        assert_eq!(level.on_hand(), 3);

        Ok(())
    }

    #[test]
    fn commit_beyond_available_reports_available_count() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(3);

        level.commit(&key, 2)?;
        let result = level.commit(&key, 2);

        assert!(
            matches!(
                result,
                Err(StockError::InsufficientStock {
                    requested: 2,
                    available: 1,
                    ..
                })
            ),
            "expected InsufficientStock, got {result:?}"
        );
        assert_eq!(level.committed(), 2, "failed commit must not change the level");

        Ok(())
    }

    #[test]
    fn release_clamps_at_zero() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(3);

        level.commit(&key, 1)?;

        assert_eq!(level.release(5), 1);
        assert_eq!(level.committed(), 0);
        assert_eq!(level.available(), 3);

        Ok(())
    }

    #[test]
    fn settle_moves_held_units_out_of_stock() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(4);

        level.commit(&key, 3)?;
        level.settle(&key, 2)?;

        assert_eq!(level.on_hand(), 2);
        assert_eq!(level.committed(), 1);
        assert_eq!(level.available(), 1);

        let result = level.settle(&key, 2);

        assert!(
            matches!(result, Err(StockError::NotCommitted { committed: 1, .. })),
            "expected NotCommitted, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn decrement_respects_holds() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(2);

        level.commit(&key, 1)?;

        assert!(level.decrement(&key, 2).is_err(), "held unit is not decrementable");

        level.decrement(&key, 1)?;

        assert_eq!(level.on_hand(), 1);
        assert_eq!(level.available(), 0);

        Ok(())
    }

    #[test]
    fn set_on_hand_refuses_counts_below_committed() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(5);

        level.commit(&key, 3)?;

        assert!(
            matches!(
                level.set_on_hand(&key, 2),
                Err(StockError::BelowCommitted { committed: 3, .. })
            ),
            "count below holds should be refused"
        );

        level.set_on_hand(&key, 10)?;

        assert_eq!(level.available(), 7);

        Ok(())
    }

    #[test]
    fn low_stock_flag_excludes_sold_out() -> TestResult {
        let key = key();
        let mut level = StockLevel::new(3);

        assert!(!level.is_low(), "three available is not low");

        level.commit(&key, 1)?;
        assert!(level.is_low(), "two available is low");

        level.commit(&key, 2)?;
        assert!(!level.is_low(), "sold out is not low");

        Ok(())
    }
}
