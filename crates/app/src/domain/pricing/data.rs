//! Pricing Data

use vitrine::{pricing::PriceQuote, products::Product, stock::Size};

/// Availability of one size in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeAvailability {
    pub size: Size,
    pub available: u32,
    pub low_stock: bool,
}

/// A product as a channel shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub product: Product,
    pub quote: PriceQuote,
    pub sizes: Vec<SizeAvailability>,
}
