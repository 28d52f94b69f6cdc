//! Pricing Service

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashSet;
use tracing::debug;
use vitrine::{
    channel::Channel,
    live::LiveEventUuid,
    pricing::{PriceQuote, PricingContext, resolve_price},
    products::{Product, ProductUuid},
    promotions::PromotionalTable,
};

use crate::{
    clock::Clock,
    domain::{
        live::LiveEventsService,
        pricing::{
            PricingServiceError,
            data::{ListingEntry, SizeAvailability},
        },
        products::ProductsService,
        promotions::PromotionsService,
        stock::StockLedger,
    },
};

pub struct StorePricingService {
    products: Arc<dyn ProductsService>,
    promotions: Arc<dyn PromotionsService>,
    live: Arc<dyn LiveEventsService>,
    ledger: Arc<dyn StockLedger>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for StorePricingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorePricingService")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl StorePricingService {
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductsService>,
        promotions: Arc<dyn PromotionsService>,
        live: Arc<dyn LiveEventsService>,
        ledger: Arc<dyn StockLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            products,
            promotions,
            live,
            ledger,
            clock,
        }
    }

    async fn quote(
        &self,
        product: &Product,
        channel: Channel,
        event: Option<LiveEventUuid>,
        now: Timestamp,
        tables: &[PromotionalTable],
    ) -> Result<PriceQuote, PricingServiceError> {
        let live_override = match channel {
            Channel::Live => self.live.active_override(product.uuid, event).await,
            Channel::Catalog => None,
        };

        let context = PricingContext {
            channel,
            now,
            tables,
            live_override,
        };

        Ok(resolve_price(product, &context)?)
    }

    async fn sizes(&self, product: ProductUuid) -> Vec<SizeAvailability> {
        self.ledger
            .levels(product)
            .await
            .into_iter()
            .map(|entry| SizeAvailability {
                size: entry.size,
                available: entry.level.available(),
                low_stock: entry.level.is_low(),
            })
            .collect()
    }

    /// Products a channel shows, in display order.
    async fn visible_products(&self, channel: Channel) -> Vec<Product> {
        match channel {
            Channel::Catalog => {
                let hidden: FxHashSet<ProductUuid> =
                    self.live.catalog_hidden_products().await.into_iter().collect();

                self.products
                    .list_products()
                    .await
                    .into_iter()
                    .filter(|product| !hidden.contains(&product.uuid))
                    .collect()
            }
            Channel::Live => {
                let mut seen = FxHashSet::default();
                let mut products = Vec::new();

                for featured in self.live.on_air_products().await {
                    if !seen.insert(featured.product) {
                        continue;
                    }

                    if let Ok(product) = self.products.get_product(featured.product).await {
                        products.push(product);
                    }
                }

                products
            }
        }
    }
}

#[async_trait]
impl PricingService for StorePricingService {
    async fn resolve_price(
        &self,
        product: ProductUuid,
        channel: Channel,
    ) -> Result<PriceQuote, PricingServiceError> {
        self.resolve_price_at(product, channel, self.clock.now()).await
    }

    #[tracing::instrument(
        name = "pricing.service.resolve_price",
        skip(self),
        fields(product_uuid = %product, channel = %channel),
        err
    )]
    async fn resolve_price_at(
        &self,
        product: ProductUuid,
        channel: Channel,
        now: Timestamp,
    ) -> Result<PriceQuote, PricingServiceError> {
        let found = self
            .products
            .get_product(product)
            .await
            .map_err(|_err| PricingServiceError::NotFound(product))?;

        if channel == Channel::Catalog
            && self.live.catalog_hidden_products().await.contains(&product)
        {
            return Err(PricingServiceError::Hidden(product));
        }

        let tables = self.promotions.tables_in_effect(channel, now).await;
        let quote = self.quote(&found, channel, None, now, &tables).await?;

        debug!(
            effective_price = quote.effective_price,
            source = quote.discount_source.label(),
            "resolved price"
        );

        Ok(quote)
    }

    #[tracing::instrument(
        name = "pricing.service.resolve_event_price",
        skip(self),
        fields(product_uuid = %product, event_uuid = %event),
        err
    )]
    async fn resolve_event_price(
        &self,
        product: ProductUuid,
        event: LiveEventUuid,
    ) -> Result<PriceQuote, PricingServiceError> {
        let now = self.clock.now();
        let found = self
            .products
            .get_product(product)
            .await
            .map_err(|_err| PricingServiceError::NotFound(product))?;

        let tables = self.promotions.tables_in_effect(Channel::Live, now).await;

        self.quote(&found, Channel::Live, Some(event), now, &tables).await
    }

    async fn list(&self, channel: Channel) -> Result<Vec<ListingEntry>, PricingServiceError> {
        self.list_at(channel, self.clock.now()).await
    }

    #[tracing::instrument(
        name = "pricing.service.list",
        skip(self),
        fields(channel = %channel, products = tracing::field::Empty),
        err
    )]
    async fn list_at(
        &self,
        channel: Channel,
        now: Timestamp,
    ) -> Result<Vec<ListingEntry>, PricingServiceError> {
        let tables = self.promotions.tables_in_effect(channel, now).await;
        let products = self.visible_products(channel).await;
        let mut listing = Vec::with_capacity(products.len());

        for product in products {
            let quote = self.quote(&product, channel, None, now, &tables).await?;
            let sizes = self.sizes(product.uuid).await;

            listing.push(ListingEntry {
                product,
                quote,
                sizes,
            });
        }

        tracing::Span::current().record("products", listing.len());

        Ok(listing)
    }
}

#[automock]
#[async_trait]
pub trait PricingService: Send + Sync {
    /// Unit price of `product` on `channel` right now.
    async fn resolve_price(
        &self,
        product: ProductUuid,
        channel: Channel,
    ) -> Result<PriceQuote, PricingServiceError>;

    async fn resolve_price_at(
        &self,
        product: ProductUuid,
        channel: Channel,
        now: Timestamp,
    ) -> Result<PriceQuote, PricingServiceError>;

    /// Unit price of `product` in a bag of `event`. Overrides of other
    /// events on air don't apply.
    async fn resolve_event_price(
        &self,
        product: ProductUuid,
        event: LiveEventUuid,
    ) -> Result<PriceQuote, PricingServiceError>;

    /// Every product the channel shows, with its quote and per-size stock.
    async fn list(&self, channel: Channel) -> Result<Vec<ListingEntry>, PricingServiceError>;

    async fn list_at(
        &self,
        channel: Channel,
        now: Timestamp,
    ) -> Result<Vec<ListingEntry>, PricingServiceError>;
}
