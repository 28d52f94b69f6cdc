//! Payments

pub mod data;
pub mod gateway;
pub mod service;
pub mod sink;

pub use data::{CancelReason, GatewayNotification, GatewayStatus, OrderPaid, PaymentOutcome};
pub use gateway::{ChargeOutbox, PaymentGateway};
pub use service::*;
pub use sink::{ChannelPaidEventSink, PaidEventSink};
