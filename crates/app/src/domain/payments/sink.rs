//! "Order paid" events for downstream consumers (loyalty, fulfilment).

use mockall::automock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::warn;

use crate::domain::payments::data::OrderPaid;

/// Fire-and-forget publisher. Publishing never fails the payment.
#[automock]
pub trait PaidEventSink: Send + Sync {
    fn publish(&self, event: OrderPaid);
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelPaidEventSink {
    sender: UnboundedSender<OrderPaid>,
}

impl ChannelPaidEventSink {
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<OrderPaid>) {
        let (sender, receiver) = unbounded_channel();

        (Self { sender }, receiver)
    }
}

impl PaidEventSink for ChannelPaidEventSink {
    fn publish(&self, event: OrderPaid) {
        if let Err(error) = self.sender.send(event) {
            warn!(reference = %error.0.reference, "paid event dropped, no consumer listening");
        }
    }
}
