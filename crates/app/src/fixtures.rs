//! Store Fixtures
//!
//! YAML seed for the in-memory store: products with their stock, promotional
//! tables, live events and the products each event features. Products are
//! keyed by a slug so tables and events can point at them.

use std::{io, path::Path, str::FromStr};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::info;
use vitrine::{
    channel::{ChannelScope, ParseChannelError},
    discounts::{Discount, DiscountError},
    live::{LiveDiscount, LiveEventStatus, LiveEventUuid, LiveProduct, ParseLiveError, Visibility},
    money::{self, MoneyError},
    products::ProductUuid,
    promotions::{CategoryDiscount, PriceBase, ProductDiscount, PromotionalTableUuid},
    stock::Size,
};

use crate::{
    context::AppContext,
    domain::{
        live::data::NewLiveEvent,
        products::{
            CatalogError,
            data::{NewProduct, SizeStock},
        },
        promotions::data::NewPromotionalTable,
    },
};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse fixture")]
    Parse(#[from] serde_norway::Error),

    #[error("invalid price for `{key}`")]
    InvalidPrice {
        key: String,
        #[source]
        source: MoneyError,
    },

    #[error("invalid discount in `{key}`")]
    InvalidDiscount {
        key: String,
        #[source]
        source: DiscountError,
    },

    #[error("invalid channel scope")]
    InvalidScope(#[from] ParseChannelError),

    #[error("invalid live event field")]
    InvalidLiveField(#[from] ParseLiveError),

    #[error("`{0}` is not a product of this fixture")]
    UnknownProduct(String),

    #[error("failed to seed `{key}`")]
    Seed {
        key: String,
        #[source]
        source: CatalogError,
    },
}

/// Whole store seed.
#[derive(Debug, Default, Deserialize)]
pub struct StoreFixture {
    /// Map of product key -> product fixture
    #[serde(default)]
    pub products: FxHashMap<String, ProductFixture>,

    #[serde(default)]
    pub promotional_tables: Vec<PromotionalTableFixture>,

    /// Map of event key -> live event fixture
    #[serde(default)]
    pub live_events: FxHashMap<String, LiveEventFixture>,
}

#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    pub name: String,

    #[serde(default)]
    pub category: Option<String>,

    /// Full price (e.g., "259.90 BRL")
    pub price: String,

    /// "10%" or "20.00 BRL"
    #[serde(default)]
    pub catalog_discount: Option<String>,

    #[serde(default)]
    pub stock: Vec<StockFixture>,
}

#[derive(Debug, Deserialize)]
pub struct StockFixture {
    pub size: String,
    pub units: u32,
}

#[derive(Debug, Deserialize)]
pub struct PromotionalTableFixture {
    pub name: String,

    #[serde(default)]
    pub priority: i32,

    /// "all", "catalog" or "live"
    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub start_at: Option<Timestamp>,

    #[serde(default)]
    pub end_at: Option<Timestamp>,

    #[serde(default)]
    pub store_discount: Option<String>,

    /// Map of category -> discount
    #[serde(default)]
    pub categories: FxHashMap<String, String>,

    #[serde(default)]
    pub products: Vec<ProductDiscountFixture>,
}

#[derive(Debug, Deserialize)]
pub struct ProductDiscountFixture {
    /// Product key
    pub product: String,
    pub discount: String,

    #[serde(default)]
    pub price_base: PriceBaseFixture,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBaseFixture {
    #[default]
    Current,
    Full,
}

impl From<PriceBaseFixture> for PriceBase {
    fn from(base: PriceBaseFixture) -> Self {
        match base {
            PriceBaseFixture::Current => Self::Current,
            PriceBaseFixture::Full => Self::Full,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LiveEventFixture {
    pub title: String,

    /// "planned", "live", "ended" or "archived"
    pub status: String,

    /// Zero falls back to the platform default
    #[serde(default)]
    pub reservation_expiry_minutes: u32,

    #[serde(default)]
    pub products: Vec<LiveProductFixture>,
}

#[derive(Debug, Deserialize)]
pub struct LiveProductFixture {
    /// Product key
    pub product: String,

    /// "exclusive_live" or "catalog_and_live"
    #[serde(default = "default_visibility")]
    pub visibility: String,

    #[serde(default)]
    pub block_from_planning: bool,

    #[serde(default)]
    pub discount: Option<String>,

    #[serde(default)]
    pub price_base: PriceBaseFixture,

    #[serde(default)]
    pub unit_limit: Option<u32>,

    #[serde(default)]
    pub priority: u32,
}

fn default_scope() -> String {
    "all".to_string()
}

fn default_visibility() -> String {
    "catalog_and_live".to_string()
}

const fn default_true() -> bool {
    true
}

/// What a seed created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub products: usize,
    pub promotional_tables: usize,
    pub live_events: usize,
    pub live_products: usize,
}

impl StoreFixture {
    /// Read and parse a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Read`] or [`FixtureError::Parse`].
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    /// Parse a fixture from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Parse`] when the YAML doesn't match the fixture shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Create everything in the fixture. Products go first so tables and
    /// events can resolve their keys.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value or service rejection; whatever was
    /// created before it stays.
    #[tracing::instrument(name = "fixtures.seed", skip_all, err)]
    pub async fn seed(self, ctx: &AppContext) -> Result<SeedReport, FixtureError> {
        let mut report = SeedReport::default();
        let mut keys: FxHashMap<String, ProductUuid> = FxHashMap::default();

        for (key, fixture) in self.products {
            let product = new_product(&key, fixture)?;
            let uuid = product.uuid;

            ctx.products
                .create_product(product)
                .await
                .map_err(|source| seed_error(&key, source))?;

            keys.insert(key, uuid);
            report.products += 1;
        }

        for fixture in self.promotional_tables {
            let key = fixture.name.clone();
            let table = new_table(fixture, &keys)?;

            ctx.promotions
                .create_table(table)
                .await
                .map_err(|source| seed_error(&key, source))?;

            report.promotional_tables += 1;
        }

        for (key, fixture) in self.live_events {
            let event = LiveEventUuid::new();
            let status = LiveEventStatus::from_str(&fixture.status)?;

            ctx.live
                .create_event(NewLiveEvent {
                    uuid: event,
                    title: fixture.title,
                    status,
                    reservation_expiry_minutes: fixture.reservation_expiry_minutes,
                })
                .await
                .map_err(|source| seed_error(&key, source))?;

            report.live_events += 1;

            for featured in fixture.products {
                let live_product = live_product(event, featured, &keys)?;

                ctx.live
                    .attach_product(live_product)
                    .await
                    .map_err(|source| seed_error(&key, source))?;

                report.live_products += 1;
            }
        }

        info!(
            products = report.products,
            promotional_tables = report.promotional_tables,
            live_events = report.live_events,
            live_products = report.live_products,
            "store seeded"
        );

        Ok(report)
    }
}

fn seed_error(key: &str, source: CatalogError) -> FixtureError {
    FixtureError::Seed {
        key: key.to_string(),
        source,
    }
}

fn discount(key: &str, value: &str) -> Result<Discount, FixtureError> {
    Discount::from_str(value).map_err(|source| FixtureError::InvalidDiscount {
        key: key.to_string(),
        source,
    })
}

fn product_uuid(keys: &FxHashMap<String, ProductUuid>, key: &str) -> Result<ProductUuid, FixtureError> {
    keys.get(key)
        .copied()
        .ok_or_else(|| FixtureError::UnknownProduct(key.to_string()))
}

fn new_product(key: &str, fixture: ProductFixture) -> Result<NewProduct, FixtureError> {
    let base_price = money::parse_price(&fixture.price).map_err(|source| FixtureError::InvalidPrice {
        key: key.to_string(),
        source,
    })?;

    let catalog_discount = fixture
        .catalog_discount
        .as_deref()
        .map(|value| discount(key, value))
        .transpose()?;

    Ok(NewProduct {
        uuid: ProductUuid::new(),
        name: fixture.name,
        category: fixture.category,
        base_price,
        catalog_discount,
        stock: fixture
            .stock
            .into_iter()
            .map(|stock| SizeStock {
                size: Size::new(&stock.size),
                on_hand: stock.units,
            })
            .collect(),
    })
}

fn new_table(
    fixture: PromotionalTableFixture,
    keys: &FxHashMap<String, ProductUuid>,
) -> Result<NewPromotionalTable, FixtureError> {
    let name = fixture.name;

    let store_discount = fixture
        .store_discount
        .as_deref()
        .map(|value| discount(&name, value))
        .transpose()?;

    let category_discounts = fixture
        .categories
        .into_iter()
        .map(|(category, value)| -> Result<_, FixtureError> {
            Ok(CategoryDiscount {
                discount: discount(&name, &value)?,
                category,
            })
        })
        .collect::<Result<SmallVec<_>, FixtureError>>()?;

    let product_discounts = fixture
        .products
        .into_iter()
        .map(|entry| -> Result<_, FixtureError> {
            Ok(ProductDiscount {
                product: product_uuid(keys, &entry.product)?,
                discount: discount(&name, &entry.discount)?,
                price_base: entry.price_base.into(),
            })
        })
        .collect::<Result<Vec<_>, FixtureError>>()?;

    Ok(NewPromotionalTable {
        uuid: PromotionalTableUuid::new(),
        priority: fixture.priority,
        scope: ChannelScope::from_str(&fixture.scope)?,
        is_active: fixture.active,
        start_at: fixture.start_at,
        end_at: fixture.end_at,
        store_discount,
        category_discounts,
        product_discounts,
        name,
    })
}

fn live_product(
    event: LiveEventUuid,
    fixture: LiveProductFixture,
    keys: &FxHashMap<String, ProductUuid>,
) -> Result<LiveProduct, FixtureError> {
    let discount = fixture
        .discount
        .as_deref()
        .map(|value| -> Result<_, FixtureError> {
            Ok(LiveDiscount {
                discount: discount(&fixture.product, value)?,
                price_base: fixture.price_base.into(),
            })
        })
        .transpose()?;

    Ok(LiveProduct {
        event,
        product: product_uuid(keys, &fixture.product)?,
        visibility: Visibility::from_str(&fixture.visibility)?,
        block_from_planning: fixture.block_from_planning,
        discount,
        unit_limit: fixture.unit_limit,
        priority: fixture.priority,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use testresult::TestResult;
    use vitrine::channel::Channel;

    use super::*;
    use crate::{
        clock::ManualClock,
        domain::{
            checkout::CheckoutSettings,
            payments::{ChannelPaidEventSink, ChargeOutbox},
        },
    };

    const STORE: &str = r#"
products:
  vestido:
    name: Vestido Midi Floral
    category: vestidos
    price: "200.00 BRL"
    catalog_discount: "10%"
    stock:
      - { size: P, units: 2 }
      - { size: M, units: 3 }
  kimono:
    name: Kimono Estampado
    price: "150.00 BRL"
    stock:
      - { size: U, units: 4 }

promotional_tables:
  - name: Semana do Cliente
    priority: 10
    scope: catalog
    categories:
      vestidos: "20%"

live_events:
  quinta:
    title: Live de Quinta
    status: live
    products:
      - product: kimono
        visibility: exclusive_live
        discount: "30.00 BRL"
        unit_limit: 3
"#;

    fn context() -> AppContext {
        let (sink, _paid) = ChannelPaidEventSink::new();

        AppContext::in_memory(
            Arc::new(ManualClock::new(Timestamp::UNIX_EPOCH)),
            CheckoutSettings::default(),
            Arc::new(ChargeOutbox::new()),
            Arc::new(sink),
        )
    }

    #[tokio::test]
    async fn seed_creates_everything_and_prices_follow() -> TestResult {
        let ctx = context();
        let report = StoreFixture::from_yaml(STORE)?.seed(&ctx).await?;

        assert_eq!(
            report,
            SeedReport {
                products: 2,
                promotional_tables: 1,
                live_events: 1,
                live_products: 1,
            }
        );

        let products = ctx.products.list_products().await;
        let vestido = products
            .iter()
            .find(|product| product.name == "Vestido Midi Floral")
            .ok_or("vestido not seeded")?;
        let kimono = products
            .iter()
            .find(|product| product.name == "Kimono Estampado")
            .ok_or("kimono not seeded")?;

        let catalog = ctx.pricing.resolve_price(vestido.uuid, Channel::Catalog).await?;
        let live = ctx.pricing.resolve_price(kimono.uuid, Channel::Live).await?;

        // The table's category rule replaces the product's own 10%.
        assert_eq!(catalog.effective_price, 16_000);
        assert_eq!(live.effective_price, 12_000);
        assert_eq!(ctx.live.catalog_hidden_products().await, vec![kimono.uuid]);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_product_keys_are_rejected() -> TestResult {
        let yaml = r#"
live_events:
  sexta:
    title: Live de Sexta
    status: planned
    products:
      - product: nao_existe
"#;

        let result = StoreFixture::from_yaml(yaml)?.seed(&context()).await;

        assert!(
            matches!(&result, Err(FixtureError::UnknownProduct(key)) if key == "nao_existe"),
            "expected UnknownProduct, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn bad_prices_name_their_product() -> TestResult {
        let yaml = r#"
products:
  blusa:
    name: Blusa
    price: "39.90 USD"
"#;

        let fixture = StoreFixture::from_yaml(yaml)?;
        let (key, product) = fixture.products.into_iter().next().ok_or("no product")?;
        let result = new_product(&key, product);

        assert!(
            matches!(
                &result,
                Err(FixtureError::InvalidPrice {
                    source: MoneyError::UnsupportedCurrency(_),
                    ..
                })
            ),
            "expected InvalidPrice, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn bundled_fixture_parses() -> TestResult {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/store.yml");
        let fixture = StoreFixture::load(&path)?;

        assert!(!fixture.products.is_empty(), "bundled fixture has no products");
        assert!(!fixture.live_events.is_empty(), "bundled fixture has no live events");

        Ok(())
    }
}
