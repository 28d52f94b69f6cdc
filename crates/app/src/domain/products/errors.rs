//! Catalog management errors, shared by products, promotional tables and
//! live events.

use thiserror::Error;
use vitrine::{
    discounts::DiscountError, live::LiveEventStatus, promotions::PromotionError,
    stock::StockError,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("already exists")]
    AlreadyExists,

    #[error("not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("invalid discount")]
    InvalidDiscount(#[from] DiscountError),

    #[error("invalid promotional table")]
    InvalidTable(#[from] PromotionError),

    #[error("live event can't move from {from} to {to}")]
    InvalidStatusChange {
        from: LiveEventStatus,
        to: LiveEventStatus,
    },

    #[error("stock error")]
    Stock(#[from] StockError),
}
