//! Price resolution
//!
//! Resolves the price a customer pays for one unit of a product on a channel
//! at a point in time. Sources are tried in order and the first that applies
//! wins:
//!
//! 1. a live override, on the live channel while its event is on air;
//! 2. promotional tables in effect: product rule, else category rule, else
//!    store-wide rule, each picking the highest ranked table;
//! 3. the product's own catalog discount;
//! 4. the full price.

use jiff::Timestamp;
use thiserror::Error;

use crate::{
    channel::Channel,
    discounts::{DiscountError, normalized_percent},
    live::{LiveDiscount, LiveEventStatus, LiveEventUuid},
    products::Product,
    promotions::{PriceBase, PromotionalTable, PromotionalTableUuid},
};

/// Errors from price resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// Discount arithmetic failed.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Where a quoted discount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountSource {
    /// Live override of the given event.
    Live(LiveEventUuid),

    /// Rule of the given promotional table.
    Table(PromotionalTableUuid),

    /// The product's catalog discount.
    Catalog,

    /// No discount.
    None,
}

impl DiscountSource {
    /// Short label for listings and logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Table(_) => "table",
            Self::Catalog => "catalog",
            Self::None => "none",
        }
    }
}

/// Unit price quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    /// Price charged
    pub effective_price: u64,

    /// Full price before any discount
    pub original_price: u64,

    /// Where the discount came from
    pub discount_source: DiscountSource,

    /// Whole percent off the original price
    pub discount_percent: u8,
}

impl PriceQuote {
    /// Amount taken off one unit.
    pub const fn discount_amount(&self) -> u64 {
        self.original_price.saturating_sub(self.effective_price)
    }
}

/// Live override for the product being priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOverride {
    /// Event the override belongs to
    pub event: LiveEventUuid,

    /// Event status at resolution time
    pub status: LiveEventStatus,

    /// Discount
    pub discount: LiveDiscount,
}

/// Everything besides the product that determines a price.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    /// Channel of the sale
    pub channel: Channel,

    /// Resolution time
    pub now: Timestamp,

    /// Candidate promotional tables; ones out of effect are skipped
    pub tables: &'a [PromotionalTable],

    /// Live override for the product, if it is featured in an event
    pub live_override: Option<LiveOverride>,
}

/// Resolve the unit price of `product`.
///
/// # Errors
///
/// Returns [`PricingError::Discount`] if discount arithmetic overflows.
pub fn resolve_price(
    product: &Product,
    context: &PricingContext<'_>,
) -> Result<PriceQuote, PricingError> {
    let original = product.base_price;

    if let Some(live) = live_override(context) {
        let base = base_price(product, live.discount.price_base)?;
        let effective = live.discount.discount.apply(base)?;

        return Ok(quote(original, effective, DiscountSource::Live(live.event)));
    }

    if let Some((table, rule)) = best_table(context, |table| table.product_rule(product.uuid)) {
        let base = base_price(product, rule.price_base)?;
        let effective = rule.discount.apply(base)?;

        return Ok(quote(original, effective, DiscountSource::Table(table)));
    }

    let category_rule = product.category.as_deref().and_then(|category| {
        best_table(context, |table| {
            table.category_rule(category).map(|rule| &rule.discount)
        })
    });

    if let Some((table, discount)) =
        category_rule.or_else(|| best_table(context, |table| table.store_discount.as_ref()))
    {
        let effective = discount.apply(original)?;

        return Ok(quote(original, effective, DiscountSource::Table(table)));
    }

    if let Some(discount) = product.catalog_discount {
        let effective = discount.apply(original)?;

        return Ok(quote(original, effective, DiscountSource::Catalog));
    }

    Ok(quote(original, original, DiscountSource::None))
}

fn live_override(context: &PricingContext<'_>) -> Option<LiveOverride> {
    context.live_override.filter(|live| {
        context.channel == Channel::Live && live.status == LiveEventStatus::Live
    })
}

fn base_price(product: &Product, price_base: PriceBase) -> Result<u64, DiscountError> {
    match price_base {
        PriceBase::Current => product.current_price(),
        PriceBase::Full => Ok(product.base_price),
    }
}

/// Highest ranked in-effect table offering a rule picked by `rule`.
fn best_table<'a, R, F>(
    context: &PricingContext<'a>,
    rule: F,
) -> Option<(PromotionalTableUuid, &'a R)>
where
    F: Fn(&'a PromotionalTable) -> Option<&'a R>,
{
    context
        .tables
        .iter()
        .filter(|table| table.is_in_effect(context.channel, context.now))
        .filter_map(|table| rule(table).map(|found| (table, found)))
        .max_by(|(left, _), (right, _)| left.outranks(right))
        .map(|(table, found)| (table.uuid, found))
}

fn quote(original: u64, effective: u64, source: DiscountSource) -> PriceQuote {
    let effective = effective.min(original);

    PriceQuote {
        effective_price: effective,
        original_price: original,
        discount_source: source,
        discount_percent: normalized_percent(original, effective),
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal::Decimal;
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;
    use crate::{
        channel::ChannelScope,
        discounts::Discount,
        products::ProductUuid,
        promotions::{CategoryDiscount, ProductDiscount},
    };

    fn percent(value: i64) -> Discount {
        Discount::PercentageOff(Decimal::from(value))
    }

    fn product(base_price: u64, catalog_discount: Option<Discount>) -> Product {
        Product {
            uuid: ProductUuid::new(),
            name: "Blusa de Seda".to_string(),
            category: Some("blusas".to_string()),
            base_price,
            catalog_discount,
        }
    }

    fn table(priority: i32, updated_at: Timestamp) -> PromotionalTable {
        PromotionalTable {
            uuid: PromotionalTableUuid::new(),
            name: format!("table {priority}"),
            priority,
            scope: ChannelScope::All,
            is_active: true,
            start_at: None,
            end_at: None,
            store_discount: None,
            category_discounts: smallvec![],
            product_discounts: Vec::new(),
            updated_at,
        }
    }

    fn context(channel: Channel, now: Timestamp, tables: &[PromotionalTable]) -> PricingContext<'_> {
        PricingContext {
            channel,
            now,
            tables,
            live_override: None,
        }
    }

    #[test]
    fn no_discount_returns_full_price() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, None);
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &[]))?;

        assert_eq!(quote.effective_price, 10_000);
        assert_eq!(quote.discount_source, DiscountSource::None);
        assert_eq!(quote.discount_percent, 0);

        Ok(())
    }

    #[test]
    fn catalog_discount_applies_without_tables() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, Some(Discount::AmountOff(1_500)));
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &[]))?;

        assert_eq!(quote.effective_price, 8_500);
        assert_eq!(quote.discount_source, DiscountSource::Catalog);
        assert_eq!(quote.discount_percent, 15);

        Ok(())
    }

    #[test]
    fn product_rule_beats_category_and_store_rules() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, None);

        let mut broad = table(10, now);
        broad.store_discount = Some(percent(50));
        broad.category_discounts = smallvec![CategoryDiscount {
            category: "blusas".to_string(),
            discount: percent(40),
        }];

        let mut specific = table(1, now);
        specific.product_discounts.push(ProductDiscount {
            product: product.uuid,
            discount: percent(10),
            price_base: PriceBase::Full,
        });

        let tables = [broad, specific.clone()];
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &tables))?;

        assert_eq!(quote.effective_price, 9_000);
        assert_eq!(quote.discount_source, DiscountSource::Table(specific.uuid));

        Ok(())
    }

    #[test]
    fn category_rule_discounts_full_price() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, Some(percent(10)));

        let mut promo = table(1, now);
        promo.category_discounts = smallvec![CategoryDiscount {
            category: "BLUSAS".to_string(),
            discount: percent(20),
        }];

        let tables = [promo];
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &tables))?;

        assert_eq!(quote.effective_price, 8_000);
        assert_eq!(quote.discount_percent, 20);

        Ok(())
    }

    #[test]
    fn product_rule_on_current_price_stacks_on_catalog_discount() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, Some(percent(10)));

        let mut promo = table(1, now);
        promo.product_discounts.push(ProductDiscount {
            product: product.uuid,
            discount: percent(10),
            price_base: PriceBase::Current,
        });

        let tables = [promo];
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &tables))?;

        assert_eq!(quote.effective_price, 8_100);
        assert_eq!(quote.original_price, 10_000);
        assert_eq!(quote.discount_percent, 19);

        Ok(())
    }

    #[test]
    fn equal_priority_prefers_most_recent_update() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, None);

        let mut older = table(5, now.checked_sub(SignedDuration::from_hours(1))?);
        older.store_discount = Some(percent(10));

        let mut newer = table(5, now);
        newer.store_discount = Some(percent(25));

        let tables = [newer.clone(), older];
        let quote = resolve_price(&product, &context(Channel::Catalog, now, &tables))?;

        assert_eq!(quote.discount_source, DiscountSource::Table(newer.uuid));
        assert_eq!(quote.effective_price, 7_500);

        Ok(())
    }

    #[test]
    fn live_override_only_applies_on_air_and_on_live_channel() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, Some(percent(10)));

        let mut promo = table(1, now);
        promo.store_discount = Some(percent(5));
        let tables = [promo];

        let live = LiveOverride {
            event: LiveEventUuid::new(),
            status: LiveEventStatus::Live,
            discount: LiveDiscount {
                discount: percent(20),
                price_base: PriceBase::Current,
            },
        };

        let on_air = PricingContext {
            live_override: Some(live),
            ..context(Channel::Live, now, &tables)
        };
        let quote = resolve_price(&product, &on_air)?;

        // 20% off the catalog price of 9_000
        assert_eq!(quote.effective_price, 7_200);
        assert_eq!(quote.discount_source, DiscountSource::Live(live.event));
        assert_eq!(quote.discount_percent, 28);

        let in_catalog = PricingContext {
            channel: Channel::Catalog,
            ..on_air
        };
        assert_eq!(
            resolve_price(&product, &in_catalog)?.effective_price,
            9_500,
            "live override must not leak into the catalog"
        );

        let ended = PricingContext {
            live_override: Some(LiveOverride {
                status: LiveEventStatus::Ended,
                ..live
            }),
            ..on_air
        };
        assert!(
            matches!(
                resolve_price(&product, &ended)?.discount_source,
                DiscountSource::Table(_)
            ),
            "ended events fall back to tables"
        );

        Ok(())
    }

    #[test]
    fn live_override_on_full_price_ignores_catalog_discount() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(10_000, Some(percent(10)));
        let live = LiveOverride {
            event: LiveEventUuid::new(),
            status: LiveEventStatus::Live,
            discount: LiveDiscount {
                discount: Discount::AmountOff(2_000),
                price_base: PriceBase::Full,
            },
        };

        let context = PricingContext {
            live_override: Some(live),
            ..context(Channel::Live, now, &[])
        };
        let quote = resolve_price(&product, &context)?;

        assert_eq!(quote.effective_price, 8_000);
        assert_eq!(quote.discount_percent, 20);

        Ok(())
    }

    #[test]
    fn resolution_is_deterministic() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let product = product(12_990, Some(percent(15)));

        let mut first = table(3, now);
        first.store_discount = Some(percent(12));
        let mut second = table(3, now);
        second.store_discount = Some(percent(18));

        let tables = [first, second];
        let context = context(Channel::Catalog, now, &tables);

        let quotes: Vec<_> = (0..10)
            .map(|_| resolve_price(&product, &context))
            .collect::<Result<_, _>>()?;

        assert!(
            quotes.windows(2).all(|pair| pair.first() == pair.last()),
            "identical inputs must produce identical quotes: {quotes:?}"
        );

        Ok(())
    }
}
