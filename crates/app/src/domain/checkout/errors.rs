//! Checkout service errors.

use thiserror::Error;
use vitrine::{
    lifecycle::TransitionError, live::LiveEventUuid, products::ProductUuid, stock::Size,
    totals::TotalsError,
};

use crate::domain::{
    checkout::data::{OutOfStockLine, PriceChange},
    payments::gateway::GatewayError,
    pricing::PricingServiceError,
    reservations::ReservationError,
};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout has no lines")]
    Empty,

    #[error("line {line}: quantity must be a positive integer")]
    InvalidQuantity { line: usize },

    #[error("checkout not found")]
    NotFound,

    #[error("product {0} not found")]
    ProductNotFound(ProductUuid),

    #[error("product {0} is not sold on this channel right now")]
    NotVisible(ProductUuid),

    #[error("live event {0} not found")]
    EventNotFound(LiveEventUuid),

    #[error("live event {0} is not on air")]
    EventNotLive(LiveEventUuid),

    #[error("product {0} is not featured in this live event")]
    NotInLiveEvent(ProductUuid),

    #[error("product {product} is limited to {limit} units per event, {held} already held")]
    LiveLimitReached {
        product: ProductUuid,
        limit: u32,
        held: u32,
    },

    #[error("line {line}: insufficient stock for {product} size {size}: requested {requested}, available {available}")]
    InsufficientStock {
        line: usize,
        product: ProductUuid,
        size: Size,
        requested: u32,
        available: u32,
    },

    #[error("checkout is {status} and takes no more changes")]
    Closed { status: &'static str },

    #[error("nothing in the checkout holds stock")]
    NoActiveItems,

    #[error("{} price(s) changed since the checkout started", changes.len())]
    PriceDrift { changes: Vec<PriceChange> },

    #[error("{} line(s) ran out of stock", lines.len())]
    OutOfStock { lines: Vec<OutOfStockLine> },

    #[error("reservation expired")]
    ReservationExpired,

    #[error(transparent)]
    InvalidState(#[from] TransitionError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("pricing failed")]
    Pricing(#[source] PricingServiceError),

    #[error(transparent)]
    Totals(#[from] TotalsError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<PricingServiceError> for CheckoutError {
    fn from(error: PricingServiceError) -> Self {
        match error {
            PricingServiceError::NotFound(product) => Self::ProductNotFound(product),
            PricingServiceError::Hidden(product) => Self::NotVisible(product),
            other @ PricingServiceError::Pricing(_) => Self::Pricing(other),
        }
    }
}

impl CheckoutError {
    /// Message safe to show the customer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Empty => "Your cart is empty.".to_string(),
            Self::InvalidQuantity { .. } => "Quantities must be at least 1.".to_string(),
            Self::NotFound => "We couldn't find this checkout.".to_string(),
            Self::ProductNotFound(_) | Self::NotVisible(_) | Self::NotInLiveEvent(_) => {
                "This product is no longer available.".to_string()
            }
            Self::EventNotFound(_) | Self::EventNotLive(_) => {
                "This live isn't taking orders right now.".to_string()
            }
            Self::LiveLimitReached { .. } => {
                "This product sold out for the live.".to_string()
            }
            Self::InsufficientStock {
                size, available, ..
            } => match available {
                0 => format!("Size {size} is sold out."),
                1 => format!("Only 1 unit left in size {size}."),
                n => format!("Only {n} units left in size {size}."),
            },
            Self::Closed { .. } => "This checkout is already closed.".to_string(),
            Self::NoActiveItems => "Your bag has no items left.".to_string(),
            Self::PriceDrift { .. } => {
                "Some prices changed. Please review your order and try again.".to_string()
            }
            Self::OutOfStock { .. } => {
                "Some items ran out while you were checking out.".to_string()
            }
            Self::ReservationExpired => {
                "Your reservation expired. Please start again.".to_string()
            }
            Self::InvalidState(_)
            | Self::Reservation(_)
            | Self::Pricing(_)
            | Self::Totals(_)
            | Self::Gateway(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_products_map_to_not_visible() {
        let product = ProductUuid::new();

        let error = CheckoutError::from(PricingServiceError::Hidden(product));

        assert!(
            matches!(error, CheckoutError::NotVisible(hidden) if hidden == product),
            "expected NotVisible, got {error:?}"
        );
    }

    #[test]
    fn stock_messages_name_what_is_left() {
        let error = CheckoutError::InsufficientStock {
            line: 0,
            product: ProductUuid::new(),
            size: Size::new("m"),
            requested: 3,
            available: 1,
        };

        assert_eq!(error.user_message(), "Only 1 unit left in size M.");
    }
}
