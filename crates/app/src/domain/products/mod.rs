//! Products

pub mod data;
pub mod errors;
mod repository;
pub mod service;

pub use errors::CatalogError;
pub use service::*;
pub use vitrine::products::{Product, ProductUuid};
