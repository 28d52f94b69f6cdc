//! Stock ledger

pub mod service;

pub use service::*;
pub use vitrine::stock::{Size, StockError, StockKey, StockLevel};
