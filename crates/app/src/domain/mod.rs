//! Domain services

pub mod checkout;
pub mod common;
pub mod live;
pub mod live_carts;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod products;
pub mod promotions;
pub mod reservations;
pub mod stock;
