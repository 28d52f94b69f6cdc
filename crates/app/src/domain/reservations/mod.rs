//! Reservations

mod errors;
pub mod records;
pub mod service;

pub use errors::ReservationError;
pub use service::*;
