//! Products

use crate::{
    discounts::{Discount, DiscountError},
    uuids::TypedUuid,
};

/// Product UUID
pub type ProductUuid = TypedUuid<Product>;

/// A sellable product. Per-size stock is kept by the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Product UUID
    pub uuid: ProductUuid,

    /// Display name
    pub name: String,

    /// Category used by promotional category rules
    pub category: Option<String>,

    /// Full price in minor units
    pub base_price: u64,

    /// Standing catalog discount
    pub catalog_discount: Option<Discount>,
}

impl Product {
    /// Price after the catalog discount, or the full price without one.
    ///
    /// # Errors
    ///
    /// Returns an error if the discount arithmetic overflows.
    pub fn current_price(&self) -> Result<u64, DiscountError> {
        self.catalog_discount
            .map_or(Ok(self.base_price), |discount| discount.apply(self.base_price))
    }

    /// Whether the product belongs to `category`, ignoring case.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(category.trim()))
    }

    /// Validate price and catalog discount.
    ///
    /// # Errors
    ///
    /// Returns the discount validation error if the catalog discount doesn't
    /// fit the base price.
    pub fn validate(&self) -> Result<(), DiscountError> {
        match self.catalog_discount {
            Some(discount) => discount.validate_against(self.base_price),
            None => Ok(()),
        }
    }
}
