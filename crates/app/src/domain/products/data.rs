//! Products Data

use vitrine::{discounts::Discount, products::ProductUuid, stock::Size};

/// Opening stock count for one size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeStock {
    pub size: Size,
    pub on_hand: u32,
}

/// New Product Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub category: Option<String>,
    pub base_price: u64,
    pub catalog_discount: Option<Discount>,
    pub stock: Vec<SizeStock>,
}
