//! Price lookups
//!
//! Gathers a product, the promotional tables in effect and any live override,
//! then hands them to the pure resolver in `vitrine::pricing`.

pub mod data;
mod errors;
pub mod service;

pub use errors::PricingServiceError;
pub use service::*;
