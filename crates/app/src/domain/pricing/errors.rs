//! Pricing service errors.

use thiserror::Error;
use vitrine::{pricing::PricingError, products::ProductUuid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingServiceError {
    #[error("product {0} not found")]
    NotFound(ProductUuid),

    #[error("product {0} is not sold on this channel right now")]
    Hidden(ProductUuid),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}
