//! Price resolution scenarios

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use smallvec::smallvec;
use testresult::TestResult;
use vitrine::{
    channel::{Channel, ChannelScope},
    discounts::Discount,
    live::{LiveDiscount, LiveEventStatus, LiveEventUuid},
    pricing::{DiscountSource, LiveOverride, PricingContext, resolve_price},
    products::{Product, ProductUuid},
    promotions::{
        CategoryDiscount, PriceBase, ProductDiscount, PromotionalTable, PromotionalTableUuid,
    },
};

fn percent(value: i64) -> Discount {
    Discount::PercentageOff(Decimal::from(value))
}

fn jacket() -> Product {
    Product {
        uuid: ProductUuid::new(),
        name: "Jaqueta Jeans".to_string(),
        category: Some("jaquetas".to_string()),
        base_price: 29_990,
        catalog_discount: None,
    }
}

fn table(name: &str, priority: i32, updated_at: Timestamp) -> PromotionalTable {
    PromotionalTable {
        uuid: PromotionalTableUuid::new(),
        name: name.to_string(),
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

#[test]
fn product_rule_of_higher_priority_table_wins_over_category_rule() -> TestResult {
    let now = Timestamp::from_second(1_760_000_000)?;
    let product = jacket();

    let mut table_a = table("Inverno", 1, now);
    table_a.category_discounts = smallvec![CategoryDiscount {
        category: "jaquetas".to_string(),
        discount: percent(20),
    }];

    let mut table_b = table("Queima", 5, now);
    table_b.product_discounts.push(ProductDiscount {
        product: product.uuid,
        discount: percent(30),
        price_base: PriceBase::Current,
    });

    let tables = [table_a, table_b.clone()];
    let context = PricingContext {
        channel: Channel::Catalog,
        now,
        tables: &tables,
        live_override: None,
    };

    let quote = resolve_price(&product, &context)?;

    assert_eq!(quote.discount_percent, 30);
    assert_eq!(quote.discount_source, DiscountSource::Table(table_b.uuid));
    assert_eq!(quote.effective_price, 20_993);

    Ok(())
}

#[test]
fn expired_window_falls_back_to_catalog_discount() -> TestResult {
    let now = Timestamp::from_second(1_760_000_000)?;
    let mut product = jacket();
    product.catalog_discount = Some(Discount::AmountOff(4_990));

    let mut finished = table("Black Friday", 9, now);
    finished.end_at = Some(now.checked_sub(SignedDuration::from_secs(1))?);
    finished.store_discount = Some(percent(50));

    let tables = [finished];
    let context = PricingContext {
        channel: Channel::Catalog,
        now,
        tables: &tables,
        live_override: None,
    };

    let quote = resolve_price(&product, &context)?;

    assert_eq!(quote.discount_source, DiscountSource::Catalog);
    assert_eq!(quote.effective_price, 25_000);
    assert_eq!(quote.discount_percent, 17);

    Ok(())
}

#[test]
fn live_override_beats_every_table_on_the_live_channel() -> TestResult {
    let now = Timestamp::from_second(1_760_000_000)?;
    let product = jacket();

    let mut generous = table("Live Only", 100, now);
    generous.scope = ChannelScope::Live;
    generous.product_discounts.push(ProductDiscount {
        product: product.uuid,
        discount: percent(60),
        price_base: PriceBase::Full,
    });

    let event = LiveEventUuid::new();
    let tables = [generous];
    let context = PricingContext {
        channel: Channel::Live,
        now,
        tables: &tables,
        live_override: Some(LiveOverride {
            event,
            status: LiveEventStatus::Live,
            discount: LiveDiscount {
                discount: percent(10),
                price_base: PriceBase::Current,
            },
        }),
    };

    let quote = resolve_price(&product, &context)?;

    assert_eq!(quote.discount_source, DiscountSource::Live(event));
    assert_eq!(quote.effective_price, 26_991);

    Ok(())
}

#[test]
fn store_wide_rule_applies_when_nothing_more_specific_matches() -> TestResult {
    let now = Timestamp::from_second(1_760_000_000)?;
    let product = jacket();

    let mut storewide = table("Aniversario", 2, now);
    storewide.store_discount = Some(percent(10));
    storewide.category_discounts = smallvec![CategoryDiscount {
        category: "vestidos".to_string(),
        discount: percent(40),
    }];

    let tables = [storewide.clone()];
    let context = PricingContext {
        channel: Channel::Live,
        now,
        tables: &tables,
        live_override: None,
    };

    let quote = resolve_price(&product, &context)?;

    assert_eq!(quote.discount_source, DiscountSource::Table(storewide.uuid));
    assert_eq!(quote.effective_price, 26_991);

    Ok(())
}
