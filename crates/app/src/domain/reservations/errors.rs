//! Reservation errors.

use thiserror::Error;
use vitrine::stock::StockError;

use crate::domain::reservations::records::ReservationState;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("reservation not found")]
    NotFound,

    #[error("reservation is already finalized")]
    AlreadyFinalized,

    #[error("reservation is no longer active ({0})")]
    NotActive(ReservationState),

    #[error("reservation lapsed and must be reserved again")]
    Lapsed,

    #[error("reservation ttl must be positive")]
    InvalidTtl,
}
