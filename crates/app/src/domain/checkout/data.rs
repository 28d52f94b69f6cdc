//! Checkout requests and results.

use jiff::Timestamp;
use vitrine::{
    live::LiveEventUuid, pricing::PriceQuote, products::ProductUuid, stock::Size, totals::Totals,
};

use crate::domain::{
    checkout::{CheckoutReference, Hold},
    common::CustomerUuid,
    payments::gateway::ChargeHandle,
    reservations::records::ReservationUuid,
};

/// Where a checkout sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutChannel {
    /// Storefront order.
    Catalog,

    /// Claim into the viewer's bag for `event`.
    Live { event: LiveEventUuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer: CustomerUuid,
    pub channel: CheckoutChannel,
    pub lines: Vec<CheckoutLine>,
}

/// A line that was priced and held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLine {
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    pub quote: PriceQuote,
    pub reservation: ReservationUuid,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub reference: CheckoutReference,
    /// Lines added by this request
    pub lines: Vec<SessionLine>,
    /// Totals of the whole checkout, including earlier claims into the same bag
    pub totals: Totals,
    /// Earliest expiry among the new holds
    pub expires_at: Timestamp,
    pub bag_number: Option<u32>,
}

/// A unit price that moved beyond the tolerance since it was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChange {
    pub line: usize,
    pub product: ProductUuid,
    pub previous: u64,
    pub current: u64,
}

/// A line whose hold could not be re-acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfStockLine {
    pub line: usize,
    pub product: ProductUuid,
    pub size: Size,
    pub requested: u32,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedLine {
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    pub unit_price: u64,
    pub original_unit_price: u64,
    pub subtotal: u64,
}

impl From<&Hold> for FinalizedLine {
    fn from(hold: &Hold) -> Self {
        Self {
            product: hold.product,
            size: hold.size.clone(),
            quantity: hold.quantity,
            unit_price: hold.unit_price,
            original_unit_price: hold.original_unit_price,
            subtotal: hold.unit_price.saturating_mul(u64::from(hold.quantity)),
        }
    }
}

/// Totals frozen for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedCheckout {
    pub reference: CheckoutReference,
    pub customer: CustomerUuid,
    pub totals: Totals,
    pub lines: Vec<FinalizedLine>,
    /// Holds that had lapsed and were taken again
    pub reacquired: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayment {
    pub checkout: FinalizedCheckout,
    pub charge: ChargeHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewedHolds {
    pub reference: CheckoutReference,
    pub renewed: usize,
    /// Earliest expiry after renewal, `None` when nothing is held
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanceledCheckout {
    pub reference: CheckoutReference,
    pub released: usize,
}
