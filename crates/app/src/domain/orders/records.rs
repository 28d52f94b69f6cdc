//! Order Records

use jiff::{SignedDuration, Timestamp};
use vitrine::{
    channel::Channel,
    lifecycle::{CheckoutStatus, OrderStatus, Stage, Transition, TransitionError},
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

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

/// Order line. Frozen once the order is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    pub original_unit_price: u64,
    pub unit_price: u64,
    pub discount_percent: u8,
    pub discount_source: DiscountSource,
    pub subtotal: u64,
    pub reservation: ReservationUuid,
    pub reserved_until: Timestamp,
    pub out_of_stock: bool,
}

impl OrderLine {
    /// Line backed by a fresh `reservation`, priced by `quote`.
    #[must_use]
    pub fn new(reservation: &Reservation, quote: &PriceQuote) -> Self {
        Self {
            product: reservation.product,
            size: reservation.size.clone(),
            quantity: reservation.quantity,
            original_unit_price: quote.original_price,
            unit_price: quote.effective_price,
            discount_percent: quote.discount_percent,
            discount_source: quote.discount_source,
            subtotal: quote
                .effective_price
                .saturating_mul(u64::from(reservation.quantity)),
            reservation: reservation.uuid,
            reserved_until: reservation.expires_at,
            out_of_stock: false,
        }
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

/// Order Record
#[derive(Debug, Clone)]
pub struct Order {
    pub uuid: OrderUuid,
    pub customer: CustomerUuid,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub totals: Totals,
    pub adjustments: Adjustments,
    pub reserved_until: Timestamp,
    pub reservation_ttl: SignedDuration,
    pub payment_reference: Option<String>,
    pub attention: Option<Attention>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

impl Order {
    /// New pending order over already reserved lines.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] if the line amounts overflow.
    pub fn pending(
        uuid: OrderUuid,
        customer: CustomerUuid,
        lines: Vec<OrderLine>,
        reservation_ttl: SignedDuration,
        now: Timestamp,
    ) -> Result<Self, TotalsError> {
        let reserved_until = earliest_hold(&lines).unwrap_or(now);

        let mut order = Self {
            uuid,
            customer,
            status: OrderStatus::Pending,
            lines,
            totals: Totals::default(),
            adjustments: Adjustments::default(),
            reserved_until,
            reservation_ttl,
            payment_reference: None,
            attention: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };

        order.recompute_totals(Adjustments::default())?;

        Ok(order)
    }

    /// Whether `reservation` currently backs one of the lines.
    pub fn holds_reservation(&self, reservation: ReservationUuid) -> bool {
        self.lines.iter().any(|line| line.reservation == reservation)
    }
}

fn earliest_hold(lines: &[OrderLine]) -> Option<Timestamp> {
    lines.iter().map(|line| line.reserved_until).min()
}

impl Reservable for Order {
    type Status = OrderStatus;
    type Uuid = OrderUuid;

    const CHANNEL: Channel = Channel::Catalog;

    fn uuid(&self) -> OrderUuid {
        self.uuid
    }

    fn customer(&self) -> CustomerUuid {
        self.customer
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn reference(&self) -> CheckoutReference {
        CheckoutReference::Order(self.uuid)
    }

    fn live_event(&self) -> Option<LiveEventUuid> {
        None
    }

    fn transition(
        &mut self,
        transition: Transition,
        now: Timestamp,
    ) -> Result<OrderStatus, TransitionError> {
        self.status = self.status.apply(transition)?;
        self.updated_at = now;

        if self.status.stage() == Stage::Paid {
            self.paid_at = Some(now);
        }

        Ok(self.status)
    }

    fn holds(&self) -> Vec<Hold> {
        self.lines
            .iter()
            .enumerate()
            .map(|(index, line)| line.hold(index))
            .collect()
    }

    // Orders are all-or-nothing: every line can be held again.
    fn revivable(&self) -> Vec<Hold> {
        self.holds()
    }

    fn set_reservation(&mut self, index: usize, reservation: ReservationUuid, expires_at: Timestamp) {
        if let Some(line) = self.lines.get_mut(index) {
            line.reservation = reservation;
            line.reserved_until = expires_at;
            line.out_of_stock = false;
        }

        if let Some(earliest) = earliest_hold(&self.lines) {
            self.reserved_until = earliest;
        }
    }

    fn mark_out_of_stock(&mut self, index: usize) {
        if let Some(line) = self.lines.get_mut(index) {
            line.out_of_stock = true;
        }
    }

    fn reprice(&mut self, index: usize, quote: &PriceQuote) {
        if let Some(line) = self.lines.get_mut(index) {
            line.original_unit_price = quote.original_price;
            line.unit_price = quote.effective_price;
            line.discount_percent = quote.discount_percent;
            line.discount_source = quote.discount_source;
        }
    }

    fn reservation_owner(&self, index: usize) -> Option<ReservationOwner> {
        self.lines.get(index).map(|_| ReservationOwner::Order(self.uuid))
    }

    fn reservation_ttl(&self) -> SignedDuration {
        self.reservation_ttl
    }

    fn recompute_totals(&mut self, adjustments: Adjustments) -> Result<Totals, TotalsError> {
        for line in &mut self.lines {
            line.subtotal = line.amounts().subtotal()?;
        }

        self.totals = Totals::compute(
            self.lines.iter().map(OrderLine::amounts),
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
    use crate::domain::reservations::records::ReservationState;

    fn quote(original: u64, effective: u64) -> PriceQuote {
        PriceQuote {
            effective_price: effective,
            original_price: original,
            discount_source: DiscountSource::Catalog,
            discount_percent: 10,
        }
    }

    fn reservation(order: OrderUuid, size: &str, quantity: u32, expires_at: Timestamp) -> Reservation {
        Reservation {
            uuid: ReservationUuid::new(),
            owner: ReservationOwner::Order(order),
            product: ProductUuid::new(),
            size: Size::new(size),
            quantity,
            created_at: expires_at,
            expires_at,
            state: ReservationState::Active,
        }
    }

    fn order(now: Timestamp) -> Result<Order, Box<dyn std::error::Error>> {
        let uuid = OrderUuid::new();
        let lines = vec![
            OrderLine::new(
                &reservation(uuid, "M", 2, now.checked_add(SignedDuration::from_mins(30))?),
                &quote(10_000, 9_000),
            ),
            OrderLine::new(
                &reservation(uuid, "G", 1, now.checked_add(SignedDuration::from_mins(20))?),
                &quote(5_000, 5_000),
            ),
        ];

        Ok(Order::pending(
            uuid,
            CustomerUuid::new(),
            lines,
            SignedDuration::from_mins(30),
            now,
        )?)
    }

    #[test]
    fn pending_order_computes_totals_and_earliest_expiry() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let order = order(now)?;

        assert_eq!(order.totals.subtotal, 23_000);
        assert_eq!(order.totals.discounts, 2_000);
        assert_eq!(order.totals.total, 23_000);
        assert_eq!(order.reserved_until, now.checked_add(SignedDuration::from_mins(20))?);

        Ok(())
    }

    #[test]
    fn paying_stamps_paid_at() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut order = order(now)?;

        order.transition(Transition::RequestPayment, now)?;
        order.transition(Transition::ConfirmPayment, now)?;

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.paid_at, Some(now));

        Ok(())
    }

    #[test]
    fn set_reservation_moves_the_earliest_hold() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut order = order(now)?;
        let fresh = ReservationUuid::new();
        let later = now.checked_add(SignedDuration::from_hours(1))?;

        order.mark_out_of_stock(1);
        order.set_reservation(1, fresh, later);

        assert!(order.holds_reservation(fresh));
        assert!(!order.lines[1].out_of_stock, "a fresh hold clears the flag");
        assert_eq!(order.reserved_until, now.checked_add(SignedDuration::from_mins(30))?);

        Ok(())
    }

    #[test]
    fn adjustments_flow_into_totals() -> TestResult {
        let now = Timestamp::from_second(1_760_000_000)?;
        let mut order = order(now)?;

        let totals = order.recompute_totals(Adjustments {
            shipping_fee: 1_500,
            coupon_discount: 3_000,
        })?;

        assert_eq!(totals.total, 21_500);
        assert_eq!(order.adjustments().shipping_fee, 1_500);

        Ok(())
    }
}
