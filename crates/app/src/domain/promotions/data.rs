//! Promotions Data

use jiff::Timestamp;
use smallvec::SmallVec;
use vitrine::{
    channel::ChannelScope,
    discounts::Discount,
    promotions::{CategoryDiscount, ProductDiscount, PromotionalTable, PromotionalTableUuid},
};

/// New or replacement promotional table. `updated_at` is stamped by the
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromotionalTable {
    pub uuid: PromotionalTableUuid,
    pub name: String,
    pub priority: i32,
    pub scope: ChannelScope,
    pub is_active: bool,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub store_discount: Option<Discount>,
    pub category_discounts: SmallVec<[CategoryDiscount; 4]>,
    pub product_discounts: Vec<ProductDiscount>,
}

impl NewPromotionalTable {
    pub(crate) fn into_table(self, updated_at: Timestamp) -> PromotionalTable {
        PromotionalTable {
            uuid: self.uuid,
            name: self.name,
            priority: self.priority,
            scope: self.scope,
            is_active: self.is_active,
            start_at: self.start_at,
            end_at: self.end_at,
            store_discount: self.store_discount,
            category_discounts: self.category_discounts,
            product_discounts: self.product_discounts,
            updated_at,
        }
    }
}
