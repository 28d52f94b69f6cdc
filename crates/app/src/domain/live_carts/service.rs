//! Live Carts Service
//!
//! Backstage operator actions on individual bag items.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::info;
use vitrine::{
    lifecycle::{CheckoutStatus, ItemAction},
    live::LiveEventUuid,
    pricing::PriceQuote,
    stock::Size,
};

use crate::{
    clock::Clock,
    domain::{
        checkout::Reservable,
        live_carts::{
            LiveCartError, LiveCartStore,
            records::{LiveCart, LiveCartItem, LiveCartItemUuid, LiveCartUuid},
        },
        reservations::{ReservationManager, records::ReservationOwner},
    },
};

pub struct StoreLiveCartsService {
    store: Arc<LiveCartStore>,
    reservations: Arc<dyn ReservationManager>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for StoreLiveCartsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreLiveCartsService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl StoreLiveCartsService {
    #[must_use]
    pub fn new(
        store: Arc<LiveCartStore>,
        reservations: Arc<dyn ReservationManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            reservations,
            clock,
        }
    }

    /// Apply `action` to one item and, when it stops holding stock, give the
    /// stock back and recompute the bag's totals. The item only changes once
    /// its stock is back.
    async fn act(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
        action: ItemAction,
    ) -> Result<LiveCartItem, LiveCartError> {
        let entry = self.store.carts().get(cart).ok_or(LiveCartError::NotFound)?;
        let mut bag = entry.lock().await;

        ensure_open(&bag)?;

        let current = bag.item(item).ok_or(LiveCartError::ItemNotFound)?;
        let releases = !current.status.apply(action)?.holds_stock();
        let reservation = current.reservation;

        if releases {
            self.reservations.release(reservation).await?;
        }

        let updated = bag
            .apply_item(item, action, self.clock.now())
            .ok_or(LiveCartError::ItemNotFound)??;

        if releases {
            let adjustments = bag.adjustments();

            bag.recompute_totals(adjustments)?;
        }

        info!(item_uuid = %item, status = updated.status.as_str(), "updated bag item");

        Ok(updated)
    }
}

fn ensure_open(cart: &LiveCart) -> Result<(), LiveCartError> {
    if cart.accepts_changes() {
        return Ok(());
    }

    Err(LiveCartError::CartNotOpen {
        status: cart.status.as_str(),
    })
}

#[async_trait]
impl LiveCartsService for StoreLiveCartsService {
    #[tracing::instrument(
        name = "live_carts.service.confirm_item",
        skip(self),
        fields(cart_uuid = %cart),
        err
    )]
    async fn confirm_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError> {
        self.act(cart, item, ItemAction::Confirm).await
    }

    #[tracing::instrument(
        name = "live_carts.service.remove_item",
        skip(self),
        fields(cart_uuid = %cart),
        err
    )]
    async fn remove_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError> {
        self.act(cart, item, ItemAction::Remove).await
    }

    #[tracing::instrument(
        name = "live_carts.service.cancel_item",
        skip(self),
        fields(cart_uuid = %cart),
        err
    )]
    async fn cancel_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError> {
        self.act(cart, item, ItemAction::Cancel).await
    }

    #[tracing::instrument(
        name = "live_carts.service.substitute_item",
        skip(self),
        fields(cart_uuid = %cart, size = %size),
        err
    )]
    async fn substitute_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
        size: Size,
    ) -> Result<LiveCartItem, LiveCartError> {
        let entry = self.store.carts().get(cart).ok_or(LiveCartError::NotFound)?;
        let mut bag = entry.lock().await;

        ensure_open(&bag)?;

        let original = bag.item(item).cloned().ok_or(LiveCartError::ItemNotFound)?;

        if original.size == size {
            return Err(LiveCartError::SameSize);
        }

        original.status.apply(ItemAction::Substitute)?;

        let replacement = LiveCartItemUuid::new();
        let reservation = self
            .reservations
            .reserve(
                ReservationOwner::LiveCartItem {
                    cart,
                    item: replacement,
                },
                original.product,
                size,
                original.quantity,
                bag.reservation_ttl(),
            )
            .await?;

        if let Err(error) = self.reservations.release(original.reservation).await {
            self.reservations.release_all(vec![reservation.uuid]).await;

            return Err(error.into());
        }

        bag.apply_item(item, ItemAction::Substitute, self.clock.now())
            .ok_or(LiveCartError::ItemNotFound)??;

        // Same product, same claim: the frozen price carries over.
        let quote = PriceQuote {
            effective_price: original.unit_price,
            original_price: original.original_unit_price,
            discount_source: original.discount_source,
            discount_percent: original.discount_percent,
        };
        let substitute = LiveCartItem::reserved(replacement, &reservation, &quote);

        bag.items.push(substitute.clone());

        let adjustments = bag.adjustments();

        bag.recompute_totals(adjustments)?;

        info!(item_uuid = %replacement, "substituted bag item");

        Ok(substitute)
    }

    async fn cart(&self, cart: LiveCartUuid) -> Result<LiveCart, LiveCartError> {
        let entry = self.store.carts().get(cart).ok_or(LiveCartError::NotFound)?;

        Ok(entry.lock().await.clone())
    }

    async fn event_carts(&self, event: LiveEventUuid) -> Vec<LiveCart> {
        let mut carts = Vec::new();

        for uuid in self.store.event_carts(event) {
            if let Some(entry) = self.store.carts().get(uuid) {
                carts.push(entry.lock().await.clone());
            }
        }

        carts.sort_by_key(|cart| cart.bag_number);

        carts
    }
}

#[automock]
#[async_trait]
pub trait LiveCartsService: Send + Sync {
    /// Operator confirms a claim (`reserved → confirmed`).
    async fn confirm_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError>;

    /// Take an item out of the bag and give its stock back.
    async fn remove_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError>;

    async fn cancel_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    ) -> Result<LiveCartItem, LiveCartError>;

    /// Swap an item for another size of the same product. The new size is
    /// held before the old one is let go; on failure the bag is unchanged.
    async fn substitute_item(
        &self,
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
        size: Size,
    ) -> Result<LiveCartItem, LiveCartError>;

    async fn cart(&self, cart: LiveCartUuid) -> Result<LiveCart, LiveCartError>;

    /// Bags of one event by bag number.
    async fn event_carts(&self, event: LiveEventUuid) -> Vec<LiveCart>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;
    use vitrine::{
        lifecycle::{ItemTransitionError, LiveCartItemStatus},
        live::LiveEventStatus,
        stock::StockError,
    };

    use super::*;
    use crate::{
        domain::{
            reservations::{MockReservationManager, ReservationError},
            stock::StockLedger,
        },
        test::TestContext,
    };

    #[tokio::test]
    async fn remove_gives_stock_back_and_drops_the_item_from_totals() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let saia = ctx.product("Saia Midi", 15_000, &[("M", 2)]).await?;
        let blusa = ctx.product("Blusa Seda", 9_000, &[("P", 1)]).await?;
        let session = ctx
            .claim(event.uuid, &[(saia.uuid, "M", 1), (blusa.uuid, "P", 1)])
            .await?;

        let bag = ctx.live_carts.cart(session.cart).await?;
        let blusa_item = bag.items[1].uuid;

        let removed = ctx.live_carts.remove_item(session.cart, blusa_item).await?;

        assert_eq!(removed.status, LiveCartItemStatus::Removed);
        assert_eq!(ctx.ledger.available(blusa.uuid, Size::new("P")).await, 1);
        assert_eq!(ctx.live_carts.cart(session.cart).await?.totals.subtotal, 15_000);

        let result = ctx.live_carts.confirm_item(session.cart, blusa_item).await;

        assert!(
            matches!(
                result,
                Err(LiveCartError::InvalidItemAction(ItemTransitionError {
                    from: LiveCartItemStatus::Removed,
                    action: ItemAction::Confirm
                }))
            ),
            "expected InvalidItemAction, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn substitute_holds_the_new_size_before_releasing_the_old() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let vestido = ctx
            .product("Vestido Tubinho", 18_000, &[("M", 1), ("G", 1)])
            .await?;
        let session = ctx.claim(event.uuid, &[(vestido.uuid, "M", 1)]).await?;
        let original = ctx.live_carts.cart(session.cart).await?.items[0].uuid;

        ctx.live_carts.confirm_item(session.cart, original).await?;

        let substitute = ctx
            .live_carts
            .substitute_item(session.cart, original, Size::new("G"))
            .await?;

        assert_eq!(substitute.size, Size::new("G"));
        assert_eq!(substitute.unit_price, 18_000);
        assert_eq!(ctx.ledger.available(vestido.uuid, Size::new("M")).await, 1);
        assert_eq!(ctx.ledger.available(vestido.uuid, Size::new("G")).await, 0);

        let bag = ctx.live_carts.cart(session.cart).await?;

        assert_eq!(
            bag.item(original).map(|item| item.status),
            Some(LiveCartItemStatus::Substituted)
        );
        assert_eq!(bag.totals.subtotal, 18_000);

        Ok(())
    }

    #[tokio::test]
    async fn failed_substitution_leaves_the_bag_untouched() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let vestido = ctx
            .product("Vestido Tubinho", 18_000, &[("M", 1), ("G", 0)])
            .await?;
        let session = ctx.claim(event.uuid, &[(vestido.uuid, "M", 1)]).await?;
        let original = ctx.live_carts.cart(session.cart).await?.items[0].uuid;

        let result = ctx
            .live_carts
            .substitute_item(session.cart, original, Size::new("G"))
            .await;

        assert!(
            matches!(
                result,
                Err(LiveCartError::Reservation(ReservationError::Stock(
                    StockError::InsufficientStock { available: 0, .. }
                )))
            ),
            "expected InsufficientStock, got {result:?}"
        );

        let bag = ctx.live_carts.cart(session.cart).await?;

        assert_eq!(bag.items.len(), 1);
        assert_eq!(bag.items[0].status, LiveCartItemStatus::Reserved);
        assert_eq!(ctx.ledger.available(vestido.uuid, Size::new("M")).await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn item_keeps_its_state_when_the_release_fails() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let vestido = ctx.product("Vestido Tubinho", 18_000, &[("M", 1)]).await?;
        let session = ctx.claim(event.uuid, &[(vestido.uuid, "M", 1)]).await?;
        let item = ctx.live_carts.cart(session.cart).await?.items[0].uuid;

        let mut reservations = MockReservationManager::new();

        reservations
            .expect_release()
            .returning(|_| Err(ReservationError::NotFound));

        let live_carts = StoreLiveCartsService::new(
            Arc::clone(&ctx.checkouts.live_carts),
            Arc::new(reservations),
            ctx.clock.clone(),
        );

        let result = live_carts.remove_item(session.cart, item).await;

        assert!(
            matches!(result, Err(LiveCartError::Reservation(ReservationError::NotFound))),
            "expected the release error, got {result:?}"
        );

        let bag = live_carts.cart(session.cart).await?;

        assert_eq!(bag.items[0].status, LiveCartItemStatus::Reserved);
        assert_eq!(bag.totals.subtotal, 18_000);

        Ok(())
    }

    #[tokio::test]
    async fn closed_bags_refuse_operator_edits() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let vestido = ctx.product("Vestido Tubinho", 18_000, &[("M", 1)]).await?;
        let session = ctx.claim(event.uuid, &[(vestido.uuid, "M", 1)]).await?;
        let item = ctx.live_carts.cart(session.cart).await?.items[0].uuid;

        ctx.checkout.cancel(session.reference).await?;

        let result = ctx.live_carts.remove_item(session.cart, item).await;

        assert!(
            matches!(result, Err(LiveCartError::CartNotOpen { status: "canceled" })),
            "expected CartNotOpen, got {result:?}"
        );

        Ok(())
    }
}
