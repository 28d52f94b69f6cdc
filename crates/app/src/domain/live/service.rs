//! Live Events Service

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::info;
use vitrine::{
    live::{LiveEvent, LiveEventStatus, LiveEventUuid, LiveProduct},
    pricing::LiveOverride,
    products::ProductUuid,
    promotions::PriceBase,
};

use crate::domain::{
    live::{data::NewLiveEvent, repository::MemoryLiveEventsRepository},
    products::{CatalogError, ProductsService},
};

pub struct MemoryLiveEventsService {
    repository: MemoryLiveEventsRepository,
    products: Arc<dyn ProductsService>,
}

impl fmt::Debug for MemoryLiveEventsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLiveEventsService")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl MemoryLiveEventsService {
    #[must_use]
    pub fn new(products: Arc<dyn ProductsService>) -> Self {
        Self {
            repository: MemoryLiveEventsRepository::new(),
            products,
        }
    }

    /// Attachments kept by `keep`, given their event's current status.
    fn attachments_where(&self, keep: impl Fn(&LiveProduct, LiveEventStatus) -> bool) -> Vec<LiveProduct> {
        self.repository
            .products()
            .into_iter()
            .filter(|product| {
                self.repository
                    .event(product.event)
                    .is_some_and(|event| keep(product, event.status))
            })
            .collect()
    }
}

#[async_trait]
impl LiveEventsService for MemoryLiveEventsService {
    #[tracing::instrument(
        name = "live.service.create_event",
        skip(self, event),
        fields(event_uuid = %event.uuid, status = %event.status),
        err
    )]
    async fn create_event(&self, event: NewLiveEvent) -> Result<LiveEvent, CatalogError> {
        let created = LiveEvent {
            uuid: event.uuid,
            title: event.title,
            status: event.status,
            reservation_expiry_minutes: event.reservation_expiry_minutes,
        };

        if !self.repository.insert_event(created.clone()) {
            return Err(CatalogError::AlreadyExists);
        }

        info!(event_uuid = %created.uuid, "created live event");

        Ok(created)
    }

    async fn get_event(&self, event: LiveEventUuid) -> Result<LiveEvent, CatalogError> {
        self.repository.event(event).ok_or(CatalogError::NotFound)
    }

    async fn list_events(&self) -> Vec<LiveEvent> {
        let mut events = self.repository.events();

        events.sort_by(|left, right| left.uuid.cmp(&right.uuid));

        events
    }

    #[tracing::instrument(
        name = "live.service.set_status",
        skip(self),
        fields(event_uuid = %event, status = %status),
        err
    )]
    async fn set_status(
        &self,
        event: LiveEventUuid,
        status: LiveEventStatus,
    ) -> Result<LiveEvent, CatalogError> {
        let updated = self
            .repository
            .update_event(event, |current| {
                if !current.status.can_become(status) {
                    return Err(CatalogError::InvalidStatusChange {
                        from: current.status,
                        to: status,
                    });
                }

                current.status = status;

                Ok(())
            })
            .ok_or(CatalogError::NotFound)??;

        info!("changed live event status");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "live.service.attach_product",
        skip(self, product),
        fields(event_uuid = %product.event, product_uuid = %product.product),
        err
    )]
    async fn attach_product(&self, product: LiveProduct) -> Result<LiveProduct, CatalogError> {
        if self.repository.event(product.event).is_none() {
            return Err(CatalogError::InvalidReference);
        }

        let featured = self
            .products
            .get_product(product.product)
            .await
            .map_err(|error| match error {
                CatalogError::NotFound => CatalogError::InvalidReference,
                other => other,
            })?;

        if let Some(live) = product.discount {
            let base = match live.price_base {
                PriceBase::Current => featured.current_price()?,
                PriceBase::Full => featured.base_price,
            };

            live.discount.validate_against(base)?;
        }

        self.repository.upsert_product(product.clone());

        info!(visibility = ?product.visibility, "attached product to live event");

        Ok(product)
    }

    async fn live_product(&self, event: LiveEventUuid, product: ProductUuid) -> Option<LiveProduct> {
        self.repository.product(event, product)
    }

    async fn event_products(&self, event: LiveEventUuid) -> Vec<LiveProduct> {
        let mut products: Vec<LiveProduct> = self
            .repository
            .products()
            .into_iter()
            .filter(|product| product.event == event)
            .collect();

        products.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then(left.product.cmp(&right.product))
        });

        products
    }

    async fn active_override(
        &self,
        product: ProductUuid,
        event: Option<LiveEventUuid>,
    ) -> Option<LiveOverride> {
        self.attachments_where(|featured, status| {
            featured.product == product
                && status == LiveEventStatus::Live
                && event.is_none_or(|event| featured.event == event)
        })
        .into_iter()
        .filter_map(|featured| {
            featured.discount.map(|discount| {
                (
                    (featured.priority, featured.event),
                    LiveOverride {
                        event: featured.event,
                        status: LiveEventStatus::Live,
                        discount,
                    },
                )
            })
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, live)| live)
    }

    async fn catalog_hidden_products(&self) -> Vec<ProductUuid> {
        let mut hidden: Vec<ProductUuid> = self
            .attachments_where(|featured, status| featured.hides_from_catalog(status))
            .into_iter()
            .map(|featured| featured.product)
            .collect();

        hidden.sort();
        hidden.dedup();

        hidden
    }

    async fn on_air_products(&self) -> Vec<LiveProduct> {
        let mut products = self.attachments_where(|_, status| status == LiveEventStatus::Live);

        products.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then(left.product.cmp(&right.product))
        });

        products
    }
}

#[automock]
#[async_trait]
pub trait LiveEventsService: Send + Sync {
    async fn create_event(&self, event: NewLiveEvent) -> Result<LiveEvent, CatalogError>;

    async fn get_event(&self, event: LiveEventUuid) -> Result<LiveEvent, CatalogError>;

    async fn list_events(&self) -> Vec<LiveEvent>;

    /// Move the event along `planned → live → ended → archived`.
    async fn set_status(
        &self,
        event: LiveEventUuid,
        status: LiveEventStatus,
    ) -> Result<LiveEvent, CatalogError>;

    /// Feature a product in an event, replacing any previous attachment.
    async fn attach_product(&self, product: LiveProduct) -> Result<LiveProduct, CatalogError>;

    async fn live_product(&self, event: LiveEventUuid, product: ProductUuid) -> Option<LiveProduct>;

    /// Products of one event in running order.
    async fn event_products(&self, event: LiveEventUuid) -> Vec<LiveProduct>;

    /// Live price override for `product`, if an event on air features it
    /// with a discount. With `event`, only that event's override counts.
    async fn active_override(
        &self,
        product: ProductUuid,
        event: Option<LiveEventUuid>,
    ) -> Option<LiveOverride>;

    /// Exclusive products the catalog must not show right now.
    async fn catalog_hidden_products(&self) -> Vec<ProductUuid>;

    /// Products featured by events currently on air.
    async fn on_air_products(&self) -> Vec<LiveProduct>;
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;
    use vitrine::{
        discounts::Discount,
        live::{LiveDiscount, Visibility},
    };

    use super::*;
    use crate::test::TestContext;

    #[tokio::test]
    async fn status_only_moves_forward() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Planned).await?;

        let live = ctx.live.set_status(event.uuid, LiveEventStatus::Live).await?;

        assert_eq!(live.status, LiveEventStatus::Live);

        let result = ctx.live.set_status(event.uuid, LiveEventStatus::Planned).await;

        assert!(
            matches!(
                result,
                Err(CatalogError::InvalidStatusChange {
                    from: LiveEventStatus::Live,
                    to: LiveEventStatus::Planned
                })
            ),
            "expected InvalidStatusChange, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn attach_requires_known_event_and_product() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Planned).await?;

        let result = ctx
            .live
            .attach_product(ctx.featured(event.uuid, ProductUuid::new()))
            .await;

        assert!(
            matches!(result, Err(CatalogError::InvalidReference)),
            "expected InvalidReference, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn exclusive_products_hide_from_catalog_only_while_on_air() -> TestResult {
        let ctx = TestContext::new();
        let product = ctx.product("Conjunto Linho", 25_990, &[("M", 3)]).await?;
        let event = ctx.event(LiveEventStatus::Planned).await?;
        let mut featured = ctx.featured(event.uuid, product.uuid);

        featured.visibility = Visibility::ExclusiveLive;
        ctx.live.attach_product(featured).await?;

        assert!(ctx.live.catalog_hidden_products().await.is_empty());

        ctx.live.set_status(event.uuid, LiveEventStatus::Live).await?;

        assert_eq!(ctx.live.catalog_hidden_products().await, [product.uuid]);

        ctx.live.set_status(event.uuid, LiveEventStatus::Ended).await?;

        assert!(ctx.live.catalog_hidden_products().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn override_applies_only_to_events_on_air() -> TestResult {
        let ctx = TestContext::new();
        let product = ctx.product("Blazer Alfaiataria", 39_990, &[("G", 1)]).await?;
        let event = ctx.event(LiveEventStatus::Planned).await?;
        let mut featured = ctx.featured(event.uuid, product.uuid);

        featured.discount = Some(LiveDiscount {
            discount: Discount::PercentageOff(Decimal::from(25)),
            price_base: PriceBase::Full,
        });
        ctx.live.attach_product(featured).await?;

        assert!(ctx.live.active_override(product.uuid, None).await.is_none());

        ctx.live.set_status(event.uuid, LiveEventStatus::Live).await?;

        let live = ctx.live.active_override(product.uuid, None).await;

        assert_eq!(live.map(|live| live.event), Some(event.uuid));
        assert_eq!(ctx.live.on_air_products().await.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn override_can_be_pinned_to_one_event() -> TestResult {
        let ctx = TestContext::new();
        let product = ctx.product("Vestido Tubinho", 20_000, &[("M", 4)]).await?;
        let morning = ctx.event(LiveEventStatus::Live).await?;
        let evening = ctx.event(LiveEventStatus::Live).await?;
        let plain = ctx.event(LiveEventStatus::Live).await?;

        for (event, off, priority) in [(morning.uuid, 10, 2), (evening.uuid, 40, 1)] {
            let mut featured = ctx.featured(event, product.uuid);

            featured.priority = priority;
            featured.discount = Some(LiveDiscount {
                discount: Discount::PercentageOff(Decimal::from(off)),
                price_base: PriceBase::Full,
            });
            ctx.live.attach_product(featured).await?;
        }

        ctx.live
            .attach_product(ctx.featured(plain.uuid, product.uuid))
            .await?;

        let any = ctx.live.active_override(product.uuid, None).await;
        let pinned = ctx.live.active_override(product.uuid, Some(morning.uuid)).await;
        let without = ctx.live.active_override(product.uuid, Some(plain.uuid)).await;

        assert_eq!(any.map(|live| live.event), Some(evening.uuid));
        assert_eq!(pinned.map(|live| live.event), Some(morning.uuid));
        assert!(without.is_none(), "an event without a discount has no override");

        Ok(())
    }
}
