//! Promotional tables
//!
//! A promotional table bundles a store-wide discount, per-category discounts
//! and per-product discounts under one priority, channel scope and time
//! window. Several tables can be in effect at once; the price resolver picks
//! the most specific rule and breaks ties with [`PromotionalTable::outranks`].

use std::cmp::Ordering;

use jiff::Timestamp;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    channel::{Channel, ChannelScope},
    discounts::{Discount, DiscountError},
    products::ProductUuid,
    uuids::TypedUuid,
};

/// Promotional table UUID
pub type PromotionalTableUuid = TypedUuid<PromotionalTable>;

/// Which price a product-level or live discount is taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PriceBase {
    /// The price after the product's own catalog discount.
    #[default]
    Current,

    /// The full, undiscounted price.
    Full,
}

/// Discount for every product in a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDiscount {
    /// Category name, matched case-insensitively
    pub category: String,

    /// Discount
    pub discount: Discount,
}

/// Discount for a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductDiscount {
    /// Product
    pub product: ProductUuid,

    /// Discount
    pub discount: Discount,

    /// Price the discount is taken from
    pub price_base: PriceBase,
}

/// Errors raised validating a promotional table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromotionError {
    /// Window ends before it starts.
    #[error("promotion window ends ({end}) before it starts ({start})")]
    InvalidWindow {
        /// Window start
        start: Timestamp,

        /// Window end
        end: Timestamp,
    },

    /// A rule carries an invalid discount.
    #[error("invalid {rule} discount")]
    InvalidDiscount {
        /// Which rule failed, e.g. `store`, `category vestidos`
        rule: String,

        /// Underlying discount error
        #[source]
        source: DiscountError,
    },
}

/// Promotional table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionalTable {
    /// Table UUID
    pub uuid: PromotionalTableUuid,

    /// Display name
    pub name: String,

    /// Higher wins
    pub priority: i32,

    /// Channels the table applies to
    pub scope: ChannelScope,

    /// Manual on/off switch
    pub is_active: bool,

    /// Inclusive window start, unbounded when absent
    pub start_at: Option<Timestamp>,

    /// Inclusive window end, unbounded when absent
    pub end_at: Option<Timestamp>,

    /// Store-wide discount
    pub store_discount: Option<Discount>,

    /// Category discounts, first match wins
    pub category_discounts: SmallVec<[CategoryDiscount; 4]>,

    /// Product discounts, first match wins
    pub product_discounts: Vec<ProductDiscount>,

    /// Last modification, used as a tie-break
    pub updated_at: Timestamp,
}

impl PromotionalTable {
    /// Whether the table applies to a sale on `channel` at `now`.
    pub fn is_in_effect(&self, channel: Channel, now: Timestamp) -> bool {
        self.is_active
            && self.scope.includes(channel)
            && self.start_at.is_none_or(|start| start <= now)
            && self.end_at.is_none_or(|end| now <= end)
    }

    /// Product rule for `product`, if the table has one.
    pub fn product_rule(&self, product: ProductUuid) -> Option<&ProductDiscount> {
        self.product_discounts
            .iter()
            .find(|rule| rule.product == product)
    }

    /// Category rule for `category`, if the table has one.
    pub fn category_rule(&self, category: &str) -> Option<&CategoryDiscount> {
        self.category_discounts
            .iter()
            .find(|rule| rule.category.trim().eq_ignore_ascii_case(category.trim()))
    }

    /// Ordering between two tables offering a rule at the same specificity:
    /// priority, then most recent update, then uuid.
    pub fn outranks(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.updated_at.cmp(&other.updated_at))
            .then_with(|| self.uuid.cmp(&other.uuid))
    }

    /// Validate the window and every discount the table carries.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::InvalidWindow`] or the first
    /// [`PromotionError::InvalidDiscount`] found.
    pub fn validate(&self) -> Result<(), PromotionError> {
        if let (Some(start), Some(end)) = (self.start_at, self.end_at)
            && end < start
        {
            return Err(PromotionError::InvalidWindow { start, end });
        }

        if let Some(discount) = self.store_discount {
            check_rule("store", discount)?;
        }

        for rule in &self.category_discounts {
            check_rule(&format!("category {}", rule.category), rule.discount)?;
        }

        for rule in &self.product_discounts {
            check_rule(&format!("product {}", rule.product), rule.discount)?;
        }

        Ok(())
    }
}

fn check_rule(rule: &str, discount: Discount) -> Result<(), PromotionError> {
    discount
        .validate()
        .map_err(|source| PromotionError::InvalidDiscount {
            rule: rule.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal::Decimal;
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;

    fn table(now: Timestamp) -> PromotionalTable {
        PromotionalTable {
            uuid: PromotionalTableUuid::new(),
            name: "Semana do Vestido".to_string(),
            priority: 1,
            scope: ChannelScope::All,
            is_active: true,
            start_at: None,
            end_at: None,
            store_discount: None,
            category_discounts: smallvec![],
            product_discounts: Vec::new(),
            updated_at: now,
        }
    }

    #[test]
    fn window_bounds_are_inclusive() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut table = table(now);

        table.start_at = Some(now);
        table.end_at = Some(now);

        assert!(table.is_in_effect(Channel::Catalog, now), "bounds are inclusive");
        assert!(
            !table.is_in_effect(Channel::Catalog, now.checked_add(SignedDuration::from_secs(1))?),
            "after the end the table is out of effect"
        );

        Ok(())
    }

    #[test]
    fn inactive_or_out_of_scope_tables_are_ignored() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut table = table(now);

        table.scope = ChannelScope::Live;
        assert!(!table.is_in_effect(Channel::Catalog, now), "live-only table");

        table.scope = ChannelScope::All;
        table.is_active = false;
        assert!(!table.is_in_effect(Channel::Live, now), "inactive table");

        Ok(())
    }

    #[test]
    fn outranks_orders_by_priority_then_recency() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let older = table(now);
        let mut newer = table(now.checked_add(SignedDuration::from_secs(60))?);

        assert_eq!(newer.outranks(&older), Ordering::Greater);

        newer.priority = 0;
        assert_eq!(newer.outranks(&older), Ordering::Less);

        Ok(())
    }

    #[test]
    fn category_rules_match_case_insensitively() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut table = table(now);

        table.category_discounts = smallvec![CategoryDiscount {
            category: "Vestidos".to_string(),
            discount: Discount::PercentageOff(Decimal::from(20)),
        }];

        assert!(table.category_rule("vestidos").is_some(), "should match");
        assert!(table.category_rule("saias").is_none(), "should not match");

        Ok(())
    }

    #[test]
    fn validate_rejects_reversed_window_and_bad_discounts() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut reversed = table(now);

        reversed.start_at = Some(now);
        reversed.end_at = Some(now.checked_sub(SignedDuration::from_secs(1))?);

        assert!(
            matches!(reversed.validate(), Err(PromotionError::InvalidWindow { .. })),
            "reversed window should be rejected"
        );

        let mut greedy = table(now);
        greedy.store_discount = Some(Discount::PercentageOff(Decimal::from(95)));

        let result = greedy.validate();

        assert!(
            matches!(result, Err(PromotionError::InvalidDiscount { ref rule, .. }) if rule == "store"),
            "expected InvalidDiscount, got {result:?}"
        );

        Ok(())
    }
}
