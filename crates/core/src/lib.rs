//! Vitrine
//!
//! Pricing, stock arithmetic and checkout lifecycle primitives for a fashion
//! storefront that sells through a catalog and a live shopping channel.
//!
//! Everything in this crate is synchronous and side-effect free: callers pass
//! in the inputs (including the current time) and get values back. The async
//! services that own state live in `vitrine-app`.

pub mod channel;
pub mod discounts;
pub mod lifecycle;
pub mod live;
pub mod money;
pub mod pricing;
pub mod products;
pub mod promotions;
pub mod stock;
pub mod totals;
pub mod uuids;
