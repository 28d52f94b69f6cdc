//! Live Cart Records

use jiff::{SignedDuration, Timestamp};
use vitrine::{
    channel::Channel,
    lifecycle::{
        CheckoutStatus, ItemAction, ItemTransitionError, LiveCartItemStatus, LiveCartStatus, Stage,
        Transition, TransitionError,
    },
    live::LiveEventUuid,
    pricing::{DiscountSource, PriceQuote},
    products::ProductUuid,
    stock::Size,
    totals::{LineAmounts, Totals, TotalsError},
    uuids::TypedUuid,
};

use crate::domain::{
    checkout::{CheckoutReference, Hold, Reservable},
    common::{Adjustments, Attention, CustomerUuid},
    reservations::records::{Reservation, ReservationOwner, ReservationUuid},
};

/// Live Cart UUID
pub type LiveCartUuid = TypedUuid<LiveCart>;

/// Live Cart Item UUID
pub type LiveCartItemUuid = TypedUuid<LiveCartItem>;

/// Item claimed into a bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCartItem {
    pub uuid: LiveCartItemUuid,
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    /// Frozen at claim time, refreshed only when the bag is finalized
    pub unit_price: u64,
    pub original_unit_price: u64,
    pub discount_percent: u8,
    pub discount_source: DiscountSource,
    pub status: LiveCartItemStatus,
    pub reservation: ReservationUuid,
    pub reserved_at: Timestamp,
    pub reservation_expires_at: Timestamp,
    /// Hold lapsed and the stock was gone when we tried again
    pub out_of_stock: bool,
}

impl LiveCartItem {
    /// Item backed by a fresh `reservation`, priced by `quote`.
    #[must_use]
    pub fn reserved(uuid: LiveCartItemUuid, reservation: &Reservation, quote: &PriceQuote) -> Self {
        Self {
            uuid,
            product: reservation.product,
            size: reservation.size.clone(),
            quantity: reservation.quantity,
            unit_price: quote.effective_price,
            original_unit_price: quote.original_price,
            discount_percent: quote.discount_percent,
            discount_source: quote.discount_source,
            status: LiveCartItemStatus::Reserved,
            reservation: reservation.uuid,
            reserved_at: reservation.created_at,
            reservation_expires_at: reservation.expires_at,
            out_of_stock: false,
        }
    }

    fn revivable(&self) -> bool {
        self.status.holds_stock() || (self.status == LiveCartItemStatus::Expired && !self.out_of_stock)
    }

    fn amounts(&self) -> LineAmounts {
        LineAmounts {
            quantity: self.quantity,
            unit_price: self.unit_price,
            original_unit_price: self.original_unit_price,
        }
    }

    fn hold(&self, index: usize) -> Hold {
        Hold {
            index,
            product: self.product,
            size: self.size.clone(),
            quantity: self.quantity,
            reservation: self.reservation,
            unit_price: self.unit_price,
            original_unit_price: self.original_unit_price,
        }
    }
}

/// A viewer's bag for one live event.
#[derive(Debug, Clone)]
pub struct LiveCart {
    pub uuid: LiveCartUuid,
    pub event: LiveEventUuid,
    pub customer: CustomerUuid,
    /// Per-event sequence, starting at 1
    pub bag_number: u32,
    pub status: LiveCartStatus,
    pub items: Vec<LiveCartItem>,
    pub totals: Totals,
    pub adjustments: Adjustments,
    pub reservation_ttl: SignedDuration,
    pub payment_reference: Option<String>,
    pub attention: Option<Attention>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

impl LiveCart {
    #[must_use]
    pub fn open(
        uuid: LiveCartUuid,
        event: LiveEventUuid,
        customer: CustomerUuid,
        bag_number: u32,
        reservation_ttl: SignedDuration,
        now: Timestamp,
    ) -> Self {
        Self {
            uuid,
            event,
            customer,
            bag_number,
            status: LiveCartStatus::Open,
            items: Vec::new(),
            totals: Totals::default(),
            adjustments: Adjustments::default(),
            reservation_ttl,
            payment_reference: None,
            attention: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    /// Open or confirming bags still take claims and operator edits.
    pub fn accepts_changes(&self) -> bool {
        matches!(self.status, LiveCartStatus::Open | LiveCartStatus::Confirming)
    }

    pub fn item(&self, item: LiveCartItemUuid) -> Option<&LiveCartItem> {
        self.items.iter().find(|candidate| candidate.uuid == item)
    }

    /// Units of `product` currently holding stock in this bag.
    pub fn held_units(&self, product: ProductUuid) -> u32 {
        self.items
            .iter()
            .filter(|item| item.product == product && item.status.holds_stock())
            .map(|item| item.quantity)
            .sum()
    }

    pub fn has_holds(&self) -> bool {
        self.items.iter().any(|item| item.status.holds_stock())
    }

    /// Apply an operator or system action to one item.
    ///
    /// Returns `None` when the bag has no such item.
    ///
    /// # Errors
    ///
    /// Returns [`ItemTransitionError`] when the item can't take the action.
    pub fn apply_item(
        &mut self,
        item: LiveCartItemUuid,
        action: ItemAction,
        now: Timestamp,
    ) -> Option<Result<LiveCartItem, ItemTransitionError>> {
        let target = self.items.iter_mut().find(|candidate| candidate.uuid == item)?;

        let result = target.status.apply(action).map(|status| {
            target.status = status;
            target.clone()
        });

        if result.is_ok() {
            self.updated_at = now;
        }

        Some(result)
    }

    /// Expire the item held by `reservation`, if it still is.
    pub fn expire_reservation(
        &mut self,
        reservation: ReservationUuid,
        now: Timestamp,
    ) -> Option<LiveCartItemUuid> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.reservation == reservation && item.status.holds_stock())?;

        item.status = LiveCartItemStatus::Expired;
        self.updated_at = now;

        Some(item.uuid)
    }
}

impl Reservable for LiveCart {
    type Status = LiveCartStatus;
    type Uuid = LiveCartUuid;

    const CHANNEL: Channel = Channel::Live;

    fn uuid(&self) -> LiveCartUuid {
        self.uuid
    }

    fn customer(&self) -> CustomerUuid {
        self.customer
    }

    fn status(&self) -> LiveCartStatus {
        self.status
    }

    fn reference(&self) -> CheckoutReference {
        CheckoutReference::LiveCart(self.uuid)
    }

    fn live_event(&self) -> Option<LiveEventUuid> {
        Some(self.event)
    }

    fn transition(
        &mut self,
        transition: Transition,
        now: Timestamp,
    ) -> Result<LiveCartStatus, TransitionError> {
        self.status = self.status.apply(transition)?;
        self.updated_at = now;

        let stage = self.status.stage();

        if let Some(forced) = LiveCartItemStatus::forced_by(stage) {
            for item in &mut self.items {
                if item.status.holds_stock() {
                    item.status = forced;
                }
            }
        }

        if stage == Stage::Paid {
            self.paid_at = Some(now);
        }

        Ok(self.status)
    }

    fn holds(&self) -> Vec<Hold> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status.holds_stock())
            .map(|(index, item)| item.hold(index))
            .collect()
    }

    fn revivable(&self) -> Vec<Hold> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.revivable())
            .map(|(index, item)| item.hold(index))
            .collect()
    }

    fn set_reservation(&mut self, index: usize, reservation: ReservationUuid, expires_at: Timestamp) {
        if let Some(item) = self.items.get_mut(index) {
            if let Ok(revived) = item.status.apply(ItemAction::Revive) {
                item.status = revived;
            }

            item.reservation = reservation;
            item.reservation_expires_at = expires_at;
            item.out_of_stock = false;
        }
    }

    fn mark_out_of_stock(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            if let Ok(expired) = item.status.apply(ItemAction::Expire) {
                item.status = expired;
            }

            item.out_of_stock = true;
        }
    }

    fn reprice(&mut self, index: usize, quote: &PriceQuote) {
        if let Some(item) = self.items.get_mut(index) {
            item.unit_price = quote.effective_price;
            item.original_unit_price = quote.original_price;
            item.discount_percent = quote.discount_percent;
            item.discount_source = quote.discount_source;
        }
    }

    fn reservation_owner(&self, index: usize) -> Option<ReservationOwner> {
        self.items.get(index).map(|item| ReservationOwner::LiveCartItem {
            cart: self.uuid,
            item: item.uuid,
        })
    }

    fn reservation_ttl(&self) -> SignedDuration {
        self.reservation_ttl
    }

    fn recompute_totals(&mut self, adjustments: Adjustments) -> Result<Totals, TotalsError> {
        self.totals = Totals::compute(
            self.items
                .iter()
                .filter(|item| item.revivable())
                .map(LiveCartItem::amounts),
            adjustments.shipping_fee,
            adjustments.coupon_discount,
        )?;
        self.adjustments = adjustments;

        Ok(self.totals)
    }

    fn totals(&self) -> Totals {
        self.totals
    }

    fn adjustments(&self) -> Adjustments {
        self.adjustments
    }

    fn flag(&mut self, attention: Attention) {
        self.attention = Some(attention);
    }

    fn attention(&self) -> Option<&Attention> {
        self.attention.as_ref()
    }

    fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    fn set_payment_reference(&mut self, reference: String) {
        self.payment_reference = Some(reference);
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::domain::{orders::OrderUuid, reservations::records::ReservationState};

    fn claim(cart: &mut LiveCart, product: ProductUuid, quantity: u32, now: Timestamp) -> LiveCartItemUuid {
        let quote = PriceQuote {
            effective_price: 8_000,
            original_price: 10_000,
            discount_source: DiscountSource::Live(cart.event),
            discount_percent: 20,
        };
        let reservation = Reservation {
            uuid: ReservationUuid::new(),
            owner: ReservationOwner::Order(OrderUuid::new()),
            product,
            size: Size::new("M"),
            quantity,
            created_at: now,
            expires_at: now,
            state: ReservationState::Active,
        };
        let item = LiveCartItem::reserved(LiveCartItemUuid::new(), &reservation, &quote);
        let uuid = item.uuid;

        cart.items.push(item);

        uuid
    }

    fn cart(now: Timestamp) -> LiveCart {
        LiveCart::open(
            LiveCartUuid::new(),
            LiveEventUuid::new(),
            CustomerUuid::new(),
            1,
            SignedDuration::from_mins(30),
            now,
        )
    }

    #[test]
    fn terminal_cart_transitions_force_item_states() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut cart = cart(now);
        let product = ProductUuid::new();
        let kept = claim(&mut cart, product, 1, now);
        let removed = claim(&mut cart, product, 1, now);

        cart.apply_item(removed, ItemAction::Remove, now).transpose()?;
        cart.transition(Transition::Cancel, now)?;

        assert_eq!(
            cart.item(kept).map(|item| item.status),
            Some(LiveCartItemStatus::Canceled)
        );
        assert_eq!(
            cart.item(removed).map(|item| item.status),
            Some(LiveCartItemStatus::Removed),
            "items that already left the bag keep their state"
        );

        Ok(())
    }

    #[test]
    fn paid_cart_confirms_its_items() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut cart = cart(now);
        let item = claim(&mut cart, ProductUuid::new(), 2, now);

        cart.transition(Transition::BeginConfirmation, now)?;
        cart.transition(Transition::RequestPayment, now)?;
        cart.transition(Transition::ConfirmPayment, now)?;

        assert_eq!(
            cart.item(item).map(|item| item.status),
            Some(LiveCartItemStatus::Confirmed)
        );
        assert_eq!(cart.paid_at, Some(now));

        Ok(())
    }

    #[test]
    fn totals_skip_items_that_left_the_bag() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut cart = cart(now);
        let product = ProductUuid::new();

        claim(&mut cart, product, 2, now);
        let removed = claim(&mut cart, product, 1, now);

        cart.apply_item(removed, ItemAction::Remove, now).transpose()?;

        let totals = cart.recompute_totals(Adjustments::default())?;

        assert_eq!(totals.subtotal, 16_000);
        assert_eq!(totals.discounts, 4_000);
        assert_eq!(cart.held_units(product), 2);

        Ok(())
    }

    #[test]
    fn lapsed_item_revives_with_a_fresh_hold() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut cart = cart(now);
        let item = claim(&mut cart, ProductUuid::new(), 1, now);
        let reservation = cart.items[0].reservation;

        assert_eq!(cart.expire_reservation(reservation, now), Some(item));
        assert!(!cart.has_holds());
        assert_eq!(cart.revivable().len(), 1, "a lapsed item can be held again");

        let fresh = ReservationUuid::new();

        cart.set_reservation(0, fresh, now);

        assert_eq!(cart.items[0].status, LiveCartItemStatus::Reserved);
        assert_eq!(cart.holds().first().map(|hold| hold.reservation), Some(fresh));

        cart.mark_out_of_stock(0);

        assert!(cart.revivable().is_empty(), "out of stock items are dropped");

        Ok(())
    }

    #[test]
    fn holds_belong_to_existing_items_only() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut cart = cart(now);
        let item = claim(&mut cart, ProductUuid::new(), 1, now);

        assert_eq!(
            cart.reservation_owner(0),
            Some(ReservationOwner::LiveCartItem {
                cart: cart.uuid,
                item
            })
        );
        assert_eq!(cart.reservation_owner(1), None);

        Ok(())
    }
}
