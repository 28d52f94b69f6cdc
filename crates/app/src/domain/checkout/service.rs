//! Checkout Service
//!
//! Turns a client's lines into held stock at the price the engine resolves,
//! and walks orders and live bags up to the point the gateway takes over.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tokio::sync::Mutex;
use tracing::{Span, info, warn};
use vitrine::{
    channel::Channel,
    lifecycle::{CheckoutStatus, Stage, Transition},
    live::{LiveEvent, LiveEventStatus, LiveEventUuid},
    pricing::PriceQuote,
    products::ProductUuid,
    totals::Totals,
};

use crate::domain::{
    checkout::{
        CheckoutError, CheckoutReference, CheckoutSettings, Checkouts, Holds, Reservable,
        data::{
            CanceledCheckout, CheckoutChannel, CheckoutLine, CheckoutRequest, CheckoutSession,
            FinalizedCheckout, FinalizedLine, PreparedPayment, PriceChange, RenewedHolds,
            SessionLine,
        },
        holds::HoldRequest,
    },
    common::Adjustments,
    live::LiveEventsService,
    live_carts::{LiveCart, LiveCartItem, LiveCartItemUuid, LiveCartUuid},
    orders::{Order, OrderLine, OrderUuid},
    payments::gateway::{ChargeRequest, PaymentGateway},
    pricing::PricingService,
    reservations::records::{Reservation, ReservationOwner},
};

pub struct StoreCheckoutService {
    checkouts: Checkouts,
    holds: Holds,
    pricing: Arc<dyn PricingService>,
    live: Arc<dyn LiveEventsService>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl fmt::Debug for StoreCheckoutService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCheckoutService")
            .field("checkouts", &self.checkouts)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn validate_lines(lines: &[CheckoutLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::Empty);
    }

    if let Some(line) = lines.iter().position(|line| line.quantity == 0) {
        return Err(CheckoutError::InvalidQuantity { line });
    }

    Ok(())
}

fn session_lines(reservations: &[Reservation], quotes: &[PriceQuote]) -> Vec<SessionLine> {
    reservations
        .iter()
        .zip(quotes)
        .map(|(reservation, quote)| SessionLine {
            product: reservation.product,
            size: reservation.size.clone(),
            quantity: reservation.quantity,
            quote: *quote,
            reservation: reservation.uuid,
            expires_at: reservation.expires_at,
        })
        .collect()
}

fn closed<T: Reservable>(checkout: &T) -> CheckoutError {
    match checkout.status().stage() {
        Stage::Expired => CheckoutError::ReservationExpired,
        _ => CheckoutError::Closed {
            status: checkout.status().as_str(),
        },
    }
}

impl StoreCheckoutService {
    #[must_use]
    pub fn new(
        checkouts: Checkouts,
        holds: Holds,
        pricing: Arc<dyn PricingService>,
        live: Arc<dyn LiveEventsService>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            checkouts,
            holds,
            pricing,
            live,
            gateway,
            settings,
        }
    }

    fn order_entry(&self, order: OrderUuid) -> Result<Arc<Mutex<Order>>, CheckoutError> {
        self.checkouts.orders.get(order).ok_or(CheckoutError::NotFound)
    }

    fn cart_entry(&self, cart: LiveCartUuid) -> Result<Arc<Mutex<LiveCart>>, CheckoutError> {
        self.checkouts
            .live_carts
            .carts()
            .get(cart)
            .ok_or(CheckoutError::NotFound)
    }

    /// Catalog price, or the price inside `event` for a live bag.
    async fn price(
        &self,
        product: ProductUuid,
        event: Option<LiveEventUuid>,
    ) -> Result<PriceQuote, CheckoutError> {
        let quote = match event {
            Some(event) => self.pricing.resolve_event_price(product, event).await?,
            None => self.pricing.resolve_price(product, Channel::Catalog).await?,
        };

        Ok(quote)
    }

    async fn quote_lines(
        &self,
        lines: &[CheckoutLine],
        event: Option<LiveEventUuid>,
    ) -> Result<Vec<PriceQuote>, CheckoutError> {
        let mut quotes = Vec::with_capacity(lines.len());

        for line in lines {
            quotes.push(self.price(line.product, event).await?);
        }

        Ok(quotes)
    }

    async fn start_catalog(&self, request: CheckoutRequest) -> Result<CheckoutSession, CheckoutError> {
        let quotes = self.quote_lines(&request.lines, None).await?;
        let uuid = OrderUuid::new();
        let ttl = self.settings.catalog_reservation_ttl;

        let requests = request
            .lines
            .iter()
            .map(|line| HoldRequest {
                owner: ReservationOwner::Order(uuid),
                product: line.product,
                size: line.size.clone(),
                quantity: line.quantity,
            })
            .collect();

        let reservations = self.holds.reserve_all(requests, ttl).await?;
        let now = self.holds.now();

        let lines = reservations
            .iter()
            .zip(&quotes)
            .map(|(reservation, quote)| OrderLine::new(reservation, quote))
            .collect();

        let order = Order::pending(uuid, request.customer, lines, ttl, now)
            .map_err(CheckoutError::from)
            .and_then(|mut order| {
                order.transition(Transition::RequestPayment, now)?;

                Ok(order)
            });

        let order = match order {
            Ok(order) => order,
            Err(error) => {
                self.holds.rollback(&reservations).await;

                return Err(error);
            }
        };

        let session = CheckoutSession {
            reference: order.reference(),
            lines: session_lines(&reservations, &quotes),
            totals: order.totals,
            expires_at: order.reserved_until,
            bag_number: None,
        };

        self.checkouts.orders.insert(order);

        info!(order_uuid = %uuid, total = session.totals.total, "started catalog checkout");

        Ok(session)
    }

    async fn live_event(&self, event: LiveEventUuid) -> Result<LiveEvent, CheckoutError> {
        let found = self
            .live
            .get_event(event)
            .await
            .map_err(|_err| CheckoutError::EventNotFound(event))?;

        if found.status != LiveEventStatus::Live {
            return Err(CheckoutError::EventNotLive(event));
        }

        Ok(found)
    }

    async fn start_live(
        &self,
        request: CheckoutRequest,
        event_uuid: LiveEventUuid,
    ) -> Result<CheckoutSession, CheckoutError> {
        let event = self.live_event(event_uuid).await?;
        let mut limits: Vec<(ProductUuid, u32)> = Vec::new();

        for line in &request.lines {
            let featured = self
                .live
                .live_product(event_uuid, line.product)
                .await
                .ok_or(CheckoutError::NotInLiveEvent(line.product))?;

            if let Some(limit) = featured.unit_limit {
                limits.push((line.product, limit));
            }
        }

        let quotes = self.quote_lines(&request.lines, Some(event_uuid)).await?;
        let store = &self.checkouts.live_carts;
        let mut slot = store.claim_slot(event_uuid, request.customer).await;

        let mut current = None;

        if let Some(entry) = (*slot).and_then(|uuid| store.carts().get(uuid)) {
            let status = entry.lock().await.status;

            match status.stage() {
                Stage::Draft | Stage::Confirming => current = Some(entry),
                Stage::AwaitingPayment => {
                    return Err(CheckoutError::Closed {
                        status: status.as_str(),
                    });
                }
                Stage::Paid | Stage::Canceled | Stage::Expired => {}
            }
        }

        limits.sort();
        limits.dedup();

        let _gates = store
            .lock_gates(event_uuid, limits.iter().map(|(product, _)| *product))
            .await;

        for (product, limit) in limits {
            let requested: u32 = request
                .lines
                .iter()
                .filter(|line| line.product == product)
                .map(|line| line.quantity)
                .sum();
            let held = store.held_units(event_uuid, product).await;

            if held.saturating_add(requested) > limit {
                return Err(CheckoutError::LiveLimitReached {
                    product,
                    limit,
                    held,
                });
            }
        }

        let cart_uuid = match (&current, *slot) {
            (Some(_), Some(uuid)) => uuid,
            _ => LiveCartUuid::new(),
        };
        let item_uuids: Vec<LiveCartItemUuid> =
            request.lines.iter().map(|_| LiveCartItemUuid::new()).collect();

        let requests = request
            .lines
            .iter()
            .zip(&item_uuids)
            .map(|(line, item)| HoldRequest {
                owner: ReservationOwner::LiveCartItem {
                    cart: cart_uuid,
                    item: *item,
                },
                product: line.product,
                size: line.size.clone(),
                quantity: line.quantity,
            })
            .collect();

        let reservations = self
            .holds
            .reserve_all(requests, event.reservation_ttl())
            .await?;
        let now = self.holds.now();

        let items: Vec<LiveCartItem> = reservations
            .iter()
            .zip(&quotes)
            .zip(&item_uuids)
            .map(|((reservation, quote), item)| LiveCartItem::reserved(*item, reservation, quote))
            .collect();

        let appended = match current {
            Some(entry) => {
                let mut bag = entry.lock().await;
                let result = append_items(&mut bag, items, now);

                result.map(|totals| (bag.bag_number, totals))
            }
            None => {
                let mut bag = LiveCart::open(
                    cart_uuid,
                    event_uuid,
                    request.customer,
                    0,
                    event.reservation_ttl(),
                    now,
                );

                match append_items(&mut bag, items, now) {
                    Ok(totals) => {
                        let (bag_number, _) = store.open_bag(bag);

                        *slot = Some(cart_uuid);

                        Ok((bag_number, totals))
                    }
                    Err(error) => Err(error),
                }
            }
        };

        let (bag_number, totals) = match appended {
            Ok(appended) => appended,
            Err(error) => {
                self.holds.rollback(&reservations).await;

                return Err(error);
            }
        };

        let session = CheckoutSession {
            reference: CheckoutReference::LiveCart(cart_uuid),
            lines: session_lines(&reservations, &quotes),
            totals,
            expires_at: reservations
                .iter()
                .map(|reservation| reservation.expires_at)
                .min()
                .unwrap_or(now),
            bag_number: Some(bag_number),
        };

        info!(
            cart_uuid = %cart_uuid,
            bag_number,
            items = session.lines.len(),
            "claimed into live bag"
        );

        Ok(session)
    }

    /// Re-price, re-validate holds and freeze totals on a checkout the
    /// caller has locked. An expired checkout gets one attempt at taking its
    /// holds again; if any line can't be held it goes back to `expired`.
    async fn finalize_locked<T: Reservable>(
        &self,
        checkout: &mut T,
        adjustments: Adjustments,
    ) -> Result<FinalizedCheckout, CheckoutError> {
        let reviving = checkout.status().stage() == Stage::Expired;

        if !reviving {
            checkout.status().apply(Transition::RequestPayment)?;
        }

        let revivable = checkout.revivable();

        if revivable.is_empty() {
            return Err(if reviving {
                CheckoutError::ReservationExpired
            } else {
                CheckoutError::NoActiveItems
            });
        }

        let mut changes = Vec::new();

        for hold in &revivable {
            let quote = self.price(hold.product, checkout.live_event()).await?;

            if quote.effective_price.abs_diff(hold.unit_price) > self.settings.price_drift_tolerance {
                changes.push(PriceChange {
                    line: hold.index,
                    product: hold.product,
                    previous: hold.unit_price,
                    current: quote.effective_price,
                });

                checkout.reprice(hold.index, &quote);
            }
        }

        if !changes.is_empty() {
            checkout.recompute_totals(adjustments)?;

            info!(changes = changes.len(), "prices drifted since checkout started");

            return Err(CheckoutError::PriceDrift { changes });
        }

        if reviving {
            checkout.transition(Transition::Revive, self.holds.now())?;

            info!(reference = %checkout.reference(), "taking the holds of an expired checkout again");
        }

        let revalidation = self.holds.revalidate(checkout).await;

        if !revalidation.out_of_stock.is_empty() {
            checkout.recompute_totals(adjustments)?;

            if reviving {
                // Give back whatever was taken again.
                if let Err(error) = self.holds.close(checkout, Transition::Expire).await {
                    warn!(%error, "revived checkout could not expire again");
                }
            }

            return Err(CheckoutError::OutOfStock {
                lines: revalidation.out_of_stock,
            });
        }

        let totals = checkout.recompute_totals(adjustments)?;

        checkout.transition(Transition::RequestPayment, self.holds.now())?;

        Span::current().record("total", totals.total);

        Ok(FinalizedCheckout {
            reference: checkout.reference(),
            customer: checkout.customer(),
            totals,
            lines: checkout.holds().iter().map(FinalizedLine::from).collect(),
            reacquired: revalidation.reacquired,
        })
    }

    async fn finalize<T: Reservable>(
        &self,
        entry: Arc<Mutex<T>>,
        adjustments: Adjustments,
    ) -> Result<FinalizedCheckout, CheckoutError> {
        let mut checkout = entry.lock().await;

        self.finalize_locked(&mut *checkout, adjustments).await
    }

    async fn prepare<T: Reservable>(
        &self,
        entry: Arc<Mutex<T>>,
        adjustments: Adjustments,
    ) -> Result<PreparedPayment, CheckoutError> {
        let finalized = self.finalize(Arc::clone(&entry), adjustments).await?;

        // The gateway call runs without the checkout lock.
        let charge = self
            .gateway
            .create_charge(ChargeRequest {
                reference: finalized.reference,
                customer: finalized.customer,
                amount: finalized.totals.total,
            })
            .await?;

        entry
            .lock()
            .await
            .set_payment_reference(charge.correlation_id.clone());

        info!(correlation_id = %charge.correlation_id, "charge requested");

        Ok(PreparedPayment {
            checkout: finalized,
            charge,
        })
    }

    async fn renew<T: Reservable>(&self, entry: Arc<Mutex<T>>) -> Result<RenewedHolds, CheckoutError> {
        let mut checkout = entry.lock().await;

        if checkout.status().stage().is_terminal() {
            return Err(closed(&*checkout));
        }

        let renewed = self.holds.renew(&mut *checkout).await?;

        Ok(RenewedHolds {
            reference: checkout.reference(),
            renewed: renewed.len(),
            expires_at: renewed.iter().map(|reservation| reservation.expires_at).min(),
        })
    }

    async fn cancel_checkout<T: Reservable>(
        &self,
        entry: Arc<Mutex<T>>,
    ) -> Result<CanceledCheckout, CheckoutError> {
        let mut checkout = entry.lock().await;

        if checkout.status().stage().is_terminal() {
            return Err(closed(&*checkout));
        }

        let released = self.holds.close(&mut *checkout, Transition::Cancel).await?;

        info!(released = released.len(), "canceled checkout");

        Ok(CanceledCheckout {
            reference: checkout.reference(),
            released: released.len(),
        })
    }
}

/// Append freshly held items to a bag and recompute its totals. On failure
/// the bag is left as it was.
fn append_items(
    bag: &mut LiveCart,
    items: Vec<LiveCartItem>,
    now: Timestamp,
) -> Result<Totals, CheckoutError> {
    if !bag.accepts_changes() {
        return Err(closed(&*bag));
    }

    let before = bag.items.len();
    let adjustments = bag.adjustments();

    bag.items.extend(items);

    match bag.recompute_totals(adjustments) {
        Ok(totals) => {
            bag.updated_at = now;

            Ok(totals)
        }
        Err(error) => {
            bag.items.truncate(before);

            Err(error.into())
        }
    }
}

#[async_trait]
impl CheckoutService for StoreCheckoutService {
    #[tracing::instrument(
        name = "checkout.service.start_checkout",
        skip(self, request),
        fields(customer_uuid = %request.customer, lines = request.lines.len()),
        err
    )]
    async fn start_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, CheckoutError> {
        validate_lines(&request.lines)?;

        match request.channel {
            CheckoutChannel::Catalog => self.start_catalog(request).await,
            CheckoutChannel::Live { event } => self.start_live(request, event).await,
        }
    }

    #[tracing::instrument(
        name = "checkout.service.begin_confirmation",
        skip(self),
        fields(cart_uuid = %cart),
        err
    )]
    async fn begin_confirmation(&self, cart: LiveCartUuid) -> Result<LiveCart, CheckoutError> {
        let entry = self.cart_entry(cart)?;
        let mut bag = entry.lock().await;

        if !bag.accepts_changes() {
            return Err(closed(&*bag));
        }

        if !bag.has_holds() {
            return Err(CheckoutError::NoActiveItems);
        }

        bag.transition(Transition::BeginConfirmation, self.holds.now())?;

        Ok(bag.clone())
    }

    #[tracing::instrument(
        name = "checkout.service.finalize_for_payment",
        skip(self),
        fields(reference = %reference, total = tracing::field::Empty),
        err
    )]
    async fn finalize_for_payment(
        &self,
        reference: CheckoutReference,
        adjustments: Adjustments,
    ) -> Result<FinalizedCheckout, CheckoutError> {
        match reference {
            CheckoutReference::Order(order) => {
                self.finalize(self.order_entry(order)?, adjustments).await
            }
            CheckoutReference::LiveCart(cart) => {
                self.finalize(self.cart_entry(cart)?, adjustments).await
            }
        }
    }

    #[tracing::instrument(
        name = "checkout.service.prepare_payment",
        skip(self),
        fields(reference = %reference, total = tracing::field::Empty),
        err
    )]
    async fn prepare_payment(
        &self,
        reference: CheckoutReference,
        adjustments: Adjustments,
    ) -> Result<PreparedPayment, CheckoutError> {
        match reference {
            CheckoutReference::Order(order) => {
                self.prepare(self.order_entry(order)?, adjustments).await
            }
            CheckoutReference::LiveCart(cart) => {
                self.prepare(self.cart_entry(cart)?, adjustments).await
            }
        }
    }

    #[tracing::instrument(
        name = "checkout.service.renew_holds",
        skip(self),
        fields(reference = %reference),
        err
    )]
    async fn renew_holds(&self, reference: CheckoutReference) -> Result<RenewedHolds, CheckoutError> {
        match reference {
            CheckoutReference::Order(order) => self.renew(self.order_entry(order)?).await,
            CheckoutReference::LiveCart(cart) => self.renew(self.cart_entry(cart)?).await,
        }
    }

    #[tracing::instrument(
        name = "checkout.service.cancel",
        skip(self),
        fields(reference = %reference),
        err
    )]
    async fn cancel(&self, reference: CheckoutReference) -> Result<CanceledCheckout, CheckoutError> {
        match reference {
            CheckoutReference::Order(order) => self.cancel_checkout(self.order_entry(order)?).await,
            CheckoutReference::LiveCart(cart) => {
                self.cancel_checkout(self.cart_entry(cart)?).await
            }
        }
    }

    async fn order(&self, order: OrderUuid) -> Option<Order> {
        let entry = self.checkouts.orders.get(order)?;

        Some(entry.lock().await.clone())
    }

    async fn live_cart(&self, cart: LiveCartUuid) -> Option<LiveCart> {
        let entry = self.checkouts.live_carts.carts().get(cart)?;

        Some(entry.lock().await.clone())
    }
}

#[automock]
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Price and hold every line, all or nothing, then store the order or
    /// append to the viewer's bag.
    async fn start_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, CheckoutError>;

    /// Viewer starts reviewing the bag (`open → confirming`).
    async fn begin_confirmation(&self, cart: LiveCartUuid) -> Result<LiveCart, CheckoutError>;

    /// Re-price and re-validate holds, then freeze totals for the gateway.
    async fn finalize_for_payment(
        &self,
        reference: CheckoutReference,
        adjustments: Adjustments,
    ) -> Result<FinalizedCheckout, CheckoutError>;

    /// Finalize, then open a charge for the backend total.
    async fn prepare_payment(
        &self,
        reference: CheckoutReference,
        adjustments: Adjustments,
    ) -> Result<PreparedPayment, CheckoutError>;

    /// Extend every live hold by the checkout's TTL.
    async fn renew_holds(&self, reference: CheckoutReference) -> Result<RenewedHolds, CheckoutError>;

    async fn cancel(&self, reference: CheckoutReference) -> Result<CanceledCheckout, CheckoutError>;

    async fn order(&self, order: OrderUuid) -> Option<Order>;

    async fn live_cart(&self, cart: LiveCartUuid) -> Option<LiveCart>;
}
