//! Promotional tables

pub mod data;
mod repository;
pub mod service;

pub use service::*;
pub use vitrine::promotions::{PromotionalTable, PromotionalTableUuid};
