//! Checkouts that hold stock.

use std::{fmt, hash::Hash, str::FromStr};

use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use vitrine::{
    channel::Channel,
    lifecycle::{CheckoutStatus, Transition, TransitionError},
    live::LiveEventUuid,
    pricing::PriceQuote,
    products::ProductUuid,
    stock::Size,
    totals::{Totals, TotalsError},
};

use crate::domain::{
    common::{Adjustments, Attention, CustomerUuid},
    live_carts::records::LiveCartUuid,
    orders::records::OrderUuid,
    reservations::records::{ReservationOwner, ReservationUuid},
};

/// What a payment or a client action points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutReference {
    Order(OrderUuid),
    LiveCart(LiveCartUuid),
}

impl CheckoutReference {
    pub const fn channel(self) -> Channel {
        match self {
            Self::Order(_) => Channel::Catalog,
            Self::LiveCart(_) => Channel::Live,
        }
    }
}

impl fmt::Display for CheckoutReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(order) => write!(f, "order:{order}"),
            Self::LiveCart(cart) => write!(f, "live_cart:{cart}"),
        }
    }
}

/// Malformed checkout reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid checkout reference: {0}")]
pub struct ParseReferenceError(pub String);

impl FromStr for CheckoutReference {
    type Err = ParseReferenceError;

    /// Accepts `live_cart:<uuid>` for bags and `order:<uuid>`, `#<uuid>` or a
    /// bare `<uuid>` for orders.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let invalid = || ParseReferenceError(value.to_string());

        if let Some(cart) = value.strip_prefix("live_cart:") {
            return cart.parse().map(Self::LiveCart).map_err(|_err| invalid());
        }

        let order = value
            .strip_prefix("order:")
            .or_else(|| value.strip_prefix('#'))
            .unwrap_or(value);

        order.parse().map(Self::Order).map_err(|_err| invalid())
    }
}

/// A line of a checkout with the hold backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    /// Position of the line in the checkout
    pub index: usize,
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    pub reservation: ReservationUuid,
    pub unit_price: u64,
    pub original_unit_price: u64,
}

/// An order or a live bag, seen by the code that reserves, re-prices and
/// settles its lines.
pub trait Reservable: Send + Sync + 'static {
    type Status: CheckoutStatus;
    type Uuid: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Channel the checkout sells on.
    const CHANNEL: Channel;

    fn uuid(&self) -> Self::Uuid;

    fn customer(&self) -> CustomerUuid;

    fn status(&self) -> Self::Status;

    fn reference(&self) -> CheckoutReference;

    /// Event a live bag was claimed in. Its override is the only live one
    /// that prices the bag.
    fn live_event(&self) -> Option<LiveEventUuid>;

    /// Move the checkout through the shared lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the lifecycle has no such edge.
    fn transition(
        &mut self,
        transition: Transition,
        now: Timestamp,
    ) -> Result<Self::Status, TransitionError>;

    /// Lines whose hold counts towards the sale.
    fn holds(&self) -> Vec<Hold>;

    /// Lines that are held or can be held again: [`Self::holds`] plus the
    /// ones whose hold lapsed.
    fn revivable(&self) -> Vec<Hold>;

    /// Attach a fresh hold to the line at `index`.
    fn set_reservation(&mut self, index: usize, reservation: ReservationUuid, expires_at: Timestamp);

    fn mark_out_of_stock(&mut self, index: usize);

    fn reprice(&mut self, index: usize, quote: &PriceQuote);

    /// Who new holds for the line at `index` belong to. `None` when there is
    /// no such line.
    fn reservation_owner(&self, index: usize) -> Option<ReservationOwner>;

    fn reservation_ttl(&self) -> SignedDuration;

    /// Recompute totals over [`Self::revivable`] lines.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] on overflow.
    fn recompute_totals(&mut self, adjustments: Adjustments) -> Result<Totals, TotalsError>;

    fn totals(&self) -> Totals;

    fn adjustments(&self) -> Adjustments;

    fn flag(&mut self, attention: Attention);

    fn attention(&self) -> Option<&Attention>;

    fn payment_reference(&self) -> Option<&str>;

    fn set_payment_reference(&mut self, reference: String);
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn references_round_trip_through_display() -> TestResult {
        let order = CheckoutReference::Order(OrderUuid::new());
        let cart = CheckoutReference::LiveCart(LiveCartUuid::new());

        assert_eq!(order.to_string().parse::<CheckoutReference>()?, order);
        assert_eq!(cart.to_string().parse::<CheckoutReference>()?, cart);

        Ok(())
    }

    #[test]
    fn bare_and_hashed_uuids_point_at_orders() -> TestResult {
        let uuid = OrderUuid::new();

        assert_eq!(
            uuid.to_string().parse::<CheckoutReference>()?,
            CheckoutReference::Order(uuid)
        );
        assert_eq!(
            format!("#{uuid}").parse::<CheckoutReference>()?,
            CheckoutReference::Order(uuid)
        );

        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        let result = "live_cart:not-a-uuid".parse::<CheckoutReference>();

        assert!(result.is_err(), "expected an error, got {result:?}");
        assert_eq!(CheckoutReference::Order(OrderUuid::new()).channel(), Channel::Catalog);
    }
}
