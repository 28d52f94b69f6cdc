//! Checkout orchestration

pub mod data;
mod errors;
pub mod holds;
mod reservable;
pub mod service;
mod settings;
mod store;

pub use errors::CheckoutError;
pub use holds::Holds;
pub use reservable::{CheckoutReference, Hold, ParseReferenceError, Reservable};
pub use service::*;
pub use settings::{CheckoutSettings, DEFAULT_CATALOG_RESERVATION_TTL};
pub use store::{CheckoutStore, Checkouts};
