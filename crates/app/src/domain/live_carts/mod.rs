//! Live bags

mod errors;
pub mod records;
pub mod service;
mod store;

pub use errors::LiveCartError;
pub use records::{LiveCart, LiveCartItem, LiveCartItemUuid, LiveCartUuid};
pub use service::*;
pub use store::LiveCartStore;
