//! Reservation Records

use std::fmt;

use jiff::Timestamp;
use vitrine::{
    products::ProductUuid,
    stock::{Size, StockKey},
    uuids::TypedUuid,
};

use crate::domain::{
    live_carts::records::{LiveCartItemUuid, LiveCartUuid},
    orders::records::OrderUuid,
};

pub type ReservationUuid = TypedUuid<Reservation>;

/// What a hold belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationOwner {
    Order(OrderUuid),
    LiveCartItem {
        cart: LiveCartUuid,
        item: LiveCartItemUuid,
    },
}

impl fmt::Display for ReservationOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(order) => write!(f, "order:{order}"),
            Self::LiveCartItem { cart, item } => write!(f, "live_cart:{cart}/{item}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationState {
    Active,
    Released,
    Expired,
    Finalized,
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Expired => "expired",
            Self::Finalized => "finalized",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub uuid: ReservationUuid,
    pub owner: ReservationOwner,
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub state: ReservationState,
}

impl Reservation {
    /// Active and not yet past its TTL.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.state == ReservationState::Active && now < self.expires_at
    }

    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.product, self.size.clone())
    }
}
