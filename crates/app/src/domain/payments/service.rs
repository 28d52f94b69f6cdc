//! Payment reconciliation.
//!
//! Gateway events are applied as idempotent facts. Nothing here returns an
//! error: every branch ends in a [`PaymentOutcome`], and the ones a human has
//! to look at also flag the checkout.
//!
//! Event ids and the event log are remembered for a retention window; a
//! redelivery after that is still harmless because a paid checkout ignores it.

use std::{collections::VecDeque, fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use tokio::sync::Mutex;
use tracing::{Span, info, warn};
use vitrine::lifecycle::{CheckoutStatus, Stage, Transition};

use crate::{
    clock::Clock,
    domain::{
        checkout::{CheckoutReference, Checkouts, Holds, Reservable},
        common::{Attention, AttentionReason},
        payments::{
            data::{
                CancelReason, GatewayNotification, GatewayStatus, OrderPaid, PaymentEventKind,
                PaymentEventRecord, PaymentOutcome,
            },
            sink::PaidEventSink,
        },
    },
};

/// How long processed event ids and their log are kept.
pub const EVENT_RETENTION: SignedDuration = SignedDuration::from_hours(24 * 7);

pub struct StorePaymentsService {
    checkouts: Checkouts,
    holds: Holds,
    sink: Arc<dyn PaidEventSink>,
    clock: Arc<dyn Clock>,
    /// Event id -> first seen
    processed: DashMap<String, Timestamp>,
    log: DashMap<CheckoutReference, Vec<PaymentEventRecord>>,
    /// Recorded events, oldest first
    recorded: parking_lot::Mutex<VecDeque<(Timestamp, String, CheckoutReference)>>,
}

impl fmt::Debug for StorePaymentsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorePaymentsService")
            .field("checkouts", &self.checkouts)
            .field("processed", &self.processed.len())
            .finish_non_exhaustive()
    }
}

impl StorePaymentsService {
    #[must_use]
    pub fn new(
        checkouts: Checkouts,
        holds: Holds,
        sink: Arc<dyn PaidEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            checkouts,
            holds,
            sink,
            clock,
            processed: DashMap::new(),
            log: DashMap::new(),
            recorded: parking_lot::Mutex::new(VecDeque::new()),
        }
    }

    /// Forget event ids and logs older than the retention window.
    fn forget_stale(&self, now: Timestamp) {
        let Ok(cutoff) = now.checked_sub(EVENT_RETENTION) else {
            return;
        };

        let mut stale = Vec::new();

        {
            let mut recorded = self.recorded.lock();

            while recorded.front().is_some_and(|(at, _, _)| *at <= cutoff) {
                stale.extend(recorded.pop_front());
            }
        }

        for (_, event_id, reference) in stale {
            self.processed.remove_if(&event_id, |_, seen| *seen <= cutoff);
            self.log.remove_if(&reference, |_, records| {
                records.last().is_none_or(|record| record.received_at <= cutoff)
            });
        }
    }

    fn flag<T: Reservable>(&self, checkout: &mut T, reason: AttentionReason) {
        warn!(
            reference = %checkout.reference(),
            reason = reason.as_str(),
            "checkout needs attention"
        );

        checkout.flag(Attention {
            reason,
            flagged_at: self.clock.now(),
        });
    }

    /// Claim `event_id`. `false` when it was already seen.
    fn first_delivery(&self, event_id: &str) -> bool {
        match self.processed.entry(event_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.clock.now());

                true
            }
        }
    }

    fn record(
        &self,
        event_id: String,
        reference: CheckoutReference,
        kind: PaymentEventKind,
        amount: Option<u64>,
        outcome: PaymentOutcome,
    ) -> PaymentOutcome {
        // Unknown targets may show up later; let a redelivery through.
        if outcome == PaymentOutcome::NotFound {
            self.processed.remove(&event_id);
        }

        Span::current().record("outcome", outcome.as_str());

        let now = self.clock.now();

        self.forget_stale(now);
        self.recorded
            .lock()
            .push_back((now, event_id.clone(), reference));
        self.log.entry(reference).or_default().push(PaymentEventRecord {
            event_id,
            reference,
            kind,
            amount,
            outcome,
            received_at: now,
        });

        outcome
    }

    async fn confirm<T: Reservable>(&self, entry: Arc<Mutex<T>>, amount: u64) -> PaymentOutcome {
        let mut checkout = entry.lock().await;
        let status = checkout.status();

        match status.stage() {
            Stage::Paid => return PaymentOutcome::AlreadyProcessed,
            Stage::Canceled => {
                self.flag(&mut *checkout, AttentionReason::PaymentAfterCancel);

                return PaymentOutcome::Flagged;
            }
            Stage::Draft | Stage::Confirming => {
                self.flag(
                    &mut *checkout,
                    AttentionReason::UnexpectedPayment {
                        status: status.as_str(),
                    },
                );

                return PaymentOutcome::InvalidState;
            }
            Stage::AwaitingPayment | Stage::Expired => {}
        }

        let expected = checkout.totals().total;

        if expected != amount {
            self.flag(
                &mut *checkout,
                AttentionReason::AmountMismatch {
                    expected,
                    received: amount,
                },
            );

            return PaymentOutcome::AmountMismatch {
                expected,
                received: amount,
            };
        }

        let reviving = status.stage() == Stage::Expired;

        if reviving {
            if let Err(error) = checkout.transition(Transition::Revive, self.clock.now()) {
                warn!(%error, "expired checkout could not be revived");

                return PaymentOutcome::InvalidState;
            }
        }

        let revalidation = self.holds.revalidate(&mut *checkout).await;

        if !revalidation.out_of_stock.is_empty() {
            if reviving {
                // Give back whatever was taken again and put it back to rest.
                if let Err(error) = self.holds.close(&mut *checkout, Transition::Expire).await {
                    warn!(%error, "revived checkout could not expire again");
                }
            }

            self.flag(&mut *checkout, AttentionReason::OutOfStockAfterPayment);

            return PaymentOutcome::OutOfStock;
        }

        let settlement = self.holds.settle(&mut *checkout).await;

        if !settlement.failed.is_empty() {
            self.flag(&mut *checkout, AttentionReason::OutOfStockAfterPayment);
        }

        if let Err(error) = checkout.transition(Transition::ConfirmPayment, self.clock.now()) {
            warn!(%error, "settled checkout could not be marked paid");

            return PaymentOutcome::InvalidState;
        }

        self.sink.publish(OrderPaid {
            reference: checkout.reference(),
            customer: checkout.customer(),
            amount_paid: amount,
            channel: T::CHANNEL,
        });

        info!(
            reference = %checkout.reference(),
            settled = settlement.settled,
            reacquired = revalidation.reacquired,
            "payment applied"
        );

        if reviving || revalidation.reacquired > 0 {
            PaymentOutcome::Recovered
        } else {
            PaymentOutcome::Applied
        }
    }

    async fn cancel<T: Reservable>(&self, entry: Arc<Mutex<T>>, reason: CancelReason) -> PaymentOutcome {
        let mut checkout = entry.lock().await;

        match checkout.status().stage() {
            Stage::Paid => return PaymentOutcome::Ignored,
            Stage::Canceled | Stage::Expired => return PaymentOutcome::AlreadyProcessed,
            Stage::Draft | Stage::Confirming | Stage::AwaitingPayment => {}
        }

        let (transition, outcome) = match reason {
            CancelReason::TimedOut => (Transition::Expire, PaymentOutcome::Expired),
            CancelReason::Rejected | CancelReason::Canceled => {
                (Transition::Cancel, PaymentOutcome::Canceled)
            }
        };

        match self.holds.close(&mut *checkout, transition).await {
            Ok(released) => {
                info!(released = released.len(), "payment canceled, holds released");

                outcome
            }
            Err(error) => {
                warn!(%error, "canceled payment could not close the checkout");

                PaymentOutcome::InvalidState
            }
        }
    }

    async fn refund<T: Reservable>(&self, entry: Arc<Mutex<T>>) -> PaymentOutcome {
        let mut checkout = entry.lock().await;

        if checkout.status().stage() != Stage::Paid {
            return PaymentOutcome::Ignored;
        }

        self.flag(&mut *checkout, AttentionReason::Refunded);

        PaymentOutcome::Flagged
    }

    async fn apply(&self, reference: CheckoutReference, kind: PaymentEventKind, amount: u64) -> PaymentOutcome {
        match reference {
            CheckoutReference::Order(order) => match self.checkouts.orders.get(order) {
                Some(entry) => self.apply_to(entry, kind, amount).await,
                None => PaymentOutcome::NotFound,
            },
            CheckoutReference::LiveCart(cart) => match self.checkouts.live_carts.carts().get(cart) {
                Some(entry) => self.apply_to(entry, kind, amount).await,
                None => PaymentOutcome::NotFound,
            },
        }
    }

    async fn apply_to<T: Reservable>(
        &self,
        entry: Arc<Mutex<T>>,
        kind: PaymentEventKind,
        amount: u64,
    ) -> PaymentOutcome {
        match kind {
            PaymentEventKind::Confirmed => self.confirm(entry, amount).await,
            PaymentEventKind::Canceled(reason) => self.cancel(entry, reason).await,
            PaymentEventKind::Refunded => self.refund(entry).await,
        }
    }

    async fn process(
        &self,
        event_id: String,
        reference: CheckoutReference,
        kind: PaymentEventKind,
        amount: Option<u64>,
    ) -> PaymentOutcome {
        let outcome = if self.first_delivery(&event_id) {
            self.apply(reference, kind, amount.unwrap_or_default()).await
        } else {
            PaymentOutcome::AlreadyProcessed
        };

        self.record(event_id, reference, kind, amount, outcome)
    }
}

#[async_trait]
impl PaymentsService for StorePaymentsService {
    #[tracing::instrument(
        name = "payments.service.on_payment_confirmed",
        skip(self),
        fields(outcome = tracing::field::Empty)
    )]
    async fn on_payment_confirmed(
        &self,
        event_id: String,
        reference: CheckoutReference,
        amount: u64,
    ) -> PaymentOutcome {
        self.process(event_id, reference, PaymentEventKind::Confirmed, Some(amount))
            .await
    }

    #[tracing::instrument(
        name = "payments.service.on_payment_canceled",
        skip(self),
        fields(outcome = tracing::field::Empty)
    )]
    async fn on_payment_canceled(
        &self,
        event_id: String,
        reference: CheckoutReference,
        reason: CancelReason,
    ) -> PaymentOutcome {
        self.process(event_id, reference, PaymentEventKind::Canceled(reason), None)
            .await
    }

    #[tracing::instrument(
        name = "payments.service.on_gateway_notification",
        skip(self, notification),
        fields(
            event_id = %notification.event_id,
            status = ?notification.status,
            outcome = tracing::field::Empty
        )
    )]
    async fn on_gateway_notification(&self, notification: GatewayNotification) -> PaymentOutcome {
        let Ok(reference) = notification.external_reference.parse::<CheckoutReference>() else {
            warn!(
                external_reference = %notification.external_reference,
                "notification points at no checkout"
            );

            return PaymentOutcome::NotFound;
        };

        let kind = match notification.status {
            GatewayStatus::Approved => PaymentEventKind::Confirmed,
            GatewayStatus::Pending | GatewayStatus::InProcess => return PaymentOutcome::Ignored,
            GatewayStatus::Rejected => PaymentEventKind::Canceled(CancelReason::Rejected),
            GatewayStatus::Cancelled => PaymentEventKind::Canceled(CancelReason::Canceled),
            GatewayStatus::Expired => PaymentEventKind::Canceled(CancelReason::TimedOut),
            GatewayStatus::Refunded => PaymentEventKind::Refunded,
        };

        self.process(
            notification.event_id,
            reference,
            kind,
            Some(notification.amount),
        )
        .await
    }

    async fn events(&self, reference: CheckoutReference) -> Vec<PaymentEventRecord> {
        self.log
            .get(&reference)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }
}

#[automock]
#[async_trait]
pub trait PaymentsService: Send + Sync {
    /// Gateway confirmed `amount` for `reference`.
    async fn on_payment_confirmed(
        &self,
        event_id: String,
        reference: CheckoutReference,
        amount: u64,
    ) -> PaymentOutcome;

    /// Gateway gave up on the charge.
    async fn on_payment_canceled(
        &self,
        event_id: String,
        reference: CheckoutReference,
        reason: CancelReason,
    ) -> PaymentOutcome;

    /// Map a raw notification onto the events above.
    async fn on_gateway_notification(&self, notification: GatewayNotification) -> PaymentOutcome;

    /// Processed events for `reference`, oldest first.
    async fn events(&self, reference: CheckoutReference) -> Vec<PaymentEventRecord>;
}
