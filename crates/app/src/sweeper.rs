//! Expiry sweeper
//!
//! Gives lapsed holds back to the ledger and moves the checkouts they backed
//! to `expired`. Running it twice, or concurrently with itself, is harmless:
//! each hold is expired by exactly one sweep.

use std::{fmt, sync::Arc, time::Duration};

use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use vitrine::lifecycle::{CheckoutStatus, Transition};

use crate::{
    clock::Clock,
    domain::{
        checkout::{Checkouts, Holds, Reservable},
        live_carts::LiveCartUuid,
        orders::OrderUuid,
        reservations::{
            ReservationManager,
            records::{Reservation, ReservationOwner},
        },
    },
};

/// Default number of holds expired per sweep.
pub const DEFAULT_SWEEP_BATCH: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Holds expired by this sweep
    pub swept: usize,
    pub expired_orders: usize,
    pub expired_items: usize,
    /// Bags left with nothing held
    pub expired_bags: usize,
}

pub struct ExpirySweeper {
    reservations: Arc<dyn ReservationManager>,
    checkouts: Checkouts,
    holds: Holds,
    clock: Arc<dyn Clock>,
    batch: usize,
}

impl fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirySweeper")
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(
        reservations: Arc<dyn ReservationManager>,
        checkouts: Checkouts,
        holds: Holds,
        clock: Arc<dyn Clock>,
        batch: usize,
    ) -> Self {
        Self {
            reservations,
            checkouts,
            holds,
            clock,
            batch,
        }
    }

    /// Expire one batch of lapsed holds.
    #[tracing::instrument(name = "sweeper.sweep", skip(self))]
    pub async fn sweep(&self) -> SweepReport {
        let swept = self.reservations.sweep_expired(self.batch).await;
        let mut report = SweepReport {
            swept: swept.len(),
            ..SweepReport::default()
        };

        for reservation in swept {
            match reservation.owner {
                ReservationOwner::Order(order) => {
                    if self.expire_order(order, &reservation).await {
                        report.expired_orders += 1;
                    }
                }
                ReservationOwner::LiveCartItem { cart, .. } => {
                    let (item, bag) = self.expire_item(cart, &reservation).await;

                    report.expired_items += usize::from(item);
                    report.expired_bags += usize::from(bag);
                }
            }
        }

        if report.swept > 0 {
            info!(
                swept = report.swept,
                expired_orders = report.expired_orders,
                expired_items = report.expired_items,
                expired_bags = report.expired_bags,
                "sweep finished"
            );
        }

        report
    }

    async fn expire_order(
        &self,
        order: OrderUuid,
        reservation: &Reservation,
    ) -> bool {
        let Some(entry) = self.checkouts.orders.get(order) else {
            debug!(order_uuid = %order, "lapsed hold of an unknown order");

            return false;
        };

        let mut order = entry.lock().await;

        // A hold that was renewed or re-taken no longer backs the order.
        if !order.holds_reservation(reservation.uuid) || order.status.stage().is_terminal() {
            return false;
        }

        match self.holds.close(&mut *order, Transition::Expire).await {
            Ok(_) => true,
            Err(error) => {
                warn!(order_uuid = %order.uuid, %error, "order could not expire");

                false
            }
        }
    }

    async fn expire_item(
        &self,
        cart: LiveCartUuid,
        reservation: &Reservation,
    ) -> (bool, bool) {
        let Some(entry) = self.checkouts.live_carts.carts().get(cart) else {
            debug!(cart_uuid = %cart, "lapsed hold of an unknown bag");

            return (false, false);
        };

        let mut bag = entry.lock().await;
        let now = self.clock.now();

        if bag.expire_reservation(reservation.uuid, now).is_none() {
            return (false, false);
        }

        if bag.has_holds() || bag.status.stage().is_terminal() {
            return (true, false);
        }

        match bag.transition(Transition::Expire, now) {
            Ok(_) => (true, true),
            Err(error) => {
                warn!(cart_uuid = %bag.uuid, %error, "bag could not expire");

                (true, false)
            }
        }
    }

    /// Sweep every `interval` until `shutdown` turns true or its sender goes
    /// away.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);

        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), batch = self.batch, "expiry sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;
    use vitrine::{
        lifecycle::{LiveCartItemStatus, LiveCartStatus, OrderStatus},
        live::LiveEventStatus,
        stock::Size,
    };

    use super::*;
    use crate::{
        domain::{
            common::{Adjustments, CustomerUuid},
            stock::StockLedger,
        },
        test::TestContext,
    };

    #[tokio::test]
    async fn lapsed_order_expires_and_gives_stock_back() -> TestResult {
        let ctx = TestContext::new();
        let calca = ctx.product("Calca Wide Leg", 24_990, &[("38", 2), ("40", 1)]).await?;
        let order = ctx
            .order(&[(calca.uuid, "38", 2), (calca.uuid, "40", 1)])
            .await?;

        assert_eq!(ctx.sweeper.sweep().await, SweepReport::default());

        ctx.clock.advance(SignedDuration::from_mins(31));

        let report = ctx.sweeper.sweep().await;

        assert_eq!(report.swept, 2);
        assert_eq!(report.expired_orders, 1);
        assert_eq!(ctx.ledger.available(calca.uuid, Size::new("38")).await, 2);
        assert_eq!(ctx.ledger.available(calca.uuid, Size::new("40")).await, 1);
        assert_eq!(
            ctx.checkout.order(order.uuid).await.map(|order| order.status),
            Some(OrderStatus::Expired)
        );

        assert_eq!(ctx.sweeper.sweep().await.swept, 0, "second sweep finds nothing");

        Ok(())
    }

    #[tokio::test]
    async fn bag_expires_once_its_last_item_lapses() -> TestResult {
        let ctx = TestContext::new();
        let event = ctx.event(LiveEventStatus::Live).await?;
        let brinco = ctx.product("Brinco Argola", 3_990, &[("U", 5)]).await?;
        let customer = CustomerUuid::new();

        let first = ctx.claim_as(customer, event.uuid, &[(brinco.uuid, "U", 1)]).await?;

        ctx.clock.advance(SignedDuration::from_mins(20));
        ctx.claim_as(customer, event.uuid, &[(brinco.uuid, "U", 1)]).await?;
        ctx.clock.advance(SignedDuration::from_mins(11));

        let report = ctx.sweeper.sweep().await;

        assert_eq!((report.expired_items, report.expired_bags), (1, 0));

        let bag = ctx.checkout.live_cart(first.cart).await.ok_or("bag not stored")?;

        assert_eq!(bag.status, LiveCartStatus::Open);
        assert_eq!(bag.items[0].status, LiveCartItemStatus::Expired);
        assert_eq!(bag.items[1].status, LiveCartItemStatus::Reserved);

        ctx.clock.advance(SignedDuration::from_mins(30));

        let report = ctx.sweeper.sweep().await;

        assert_eq!((report.expired_items, report.expired_bags), (1, 1));
        assert_eq!(
            ctx.checkout.live_cart(first.cart).await.map(|bag| bag.status),
            Some(LiveCartStatus::Expired)
        );
        assert_eq!(ctx.ledger.available(brinco.uuid, Size::new("U")).await, 5);

        Ok(())
    }

    #[tokio::test]
    async fn holds_replaced_before_the_sweep_are_left_alone() -> TestResult {
        let ctx = TestContext::new();
        let camisa = ctx.product("Camisa Cetim", 17_990, &[("M", 1)]).await?;
        let order = ctx.order(&[(camisa.uuid, "M", 1)]).await?;

        ctx.clock.advance(SignedDuration::from_mins(31));

        // Finalizing takes the lapsed hold again under a new reservation.
        ctx.checkout
            .finalize_for_payment(order.reference(), Adjustments::default())
            .await?;

        let report = ctx.sweeper.sweep().await;

        assert_eq!(report.expired_orders, 0);
        assert_eq!(
            ctx.checkout.order(order.uuid).await.map(|order| order.status),
            Some(OrderStatus::AwaitingPayment)
        );
        assert_eq!(ctx.ledger.available(camisa.uuid, Size::new("M")).await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() -> TestResult {
        let ctx = TestContext::new();
        let (sender, receiver) = watch::channel(false);
        let sweeper = Arc::clone(&ctx.sweeper);

        let task = tokio::spawn(async move {
            sweeper.run(Duration::from_millis(5), receiver).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        sender.send(true)?;

        tokio::time::timeout(Duration::from_secs(1), task).await??;

        Ok(())
    }
}
