//! Catalog orders

pub mod records;

use crate::domain::checkout::CheckoutStore;

pub use records::{Order, OrderLine, OrderUuid};

pub type OrderStore = CheckoutStore<Order>;
