//! Live bag errors.

use thiserror::Error;
use vitrine::{lifecycle::ItemTransitionError, totals::TotalsError};

use crate::domain::reservations::ReservationError;

#[derive(Debug, Error)]
pub enum LiveCartError {
    #[error("live bag not found")]
    NotFound,

    #[error("item not found in this bag")]
    ItemNotFound,

    #[error("bag is {status} and takes no more changes")]
    CartNotOpen { status: &'static str },

    #[error(transparent)]
    InvalidItemAction(#[from] ItemTransitionError),

    #[error("replacement size is the size already held")]
    SameSize,

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Totals(#[from] TotalsError),
}
