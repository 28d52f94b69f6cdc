//! Payment events and their outcomes.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::Deserialize;
use thiserror::Error;
use vitrine::channel::Channel;

use crate::domain::{checkout::CheckoutReference, common::CustomerUuid};

/// What applying a payment event did. Reconciliation never errors; every
/// failure ends up as one of these plus, where a human must look, an
/// attention flag on the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentOutcome {
    /// Paid, holds settled.
    Applied,

    /// Paid after the holds lapsed; stock re-acquired and settled.
    Recovered,

    /// Duplicate event or target already paid. Nothing changed.
    AlreadyProcessed,

    /// Gateway amount differs from the checkout total. Flagged.
    AmountMismatch { expected: u64, received: u64 },

    /// Paid after the holds lapsed and the stock is gone. Flagged.
    OutOfStock,

    /// Payment for a checkout that isn't awaiting one. Flagged.
    InvalidState,

    /// Unknown checkout.
    NotFound,

    /// Payment for a canceled checkout. Flagged.
    Flagged,

    /// Canceled, holds released.
    Canceled,

    /// Expired after a gateway timeout, holds released.
    Expired,

    /// Event has no effect on the target, e.g. a cancel after payment.
    Ignored,
}

impl PaymentOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Recovered => "recovered",
            Self::AlreadyProcessed => "already_processed",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::OutOfStock => "out_of_stock",
            Self::InvalidState => "invalid_state",
            Self::NotFound => "not_found",
            Self::Flagged => "flagged",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gateway gave up on a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    Rejected,
    Canceled,
    /// Charge window ran out; the checkout expires instead of canceling
    TimedOut,
}

/// Payment status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Approved,
    Pending,
    InProcess,
    Rejected,
    #[serde(alias = "canceled")]
    Cancelled,
    Expired,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown gateway status: {0}")]
pub struct ParseGatewayStatusError(pub String);

impl FromStr for GatewayStatus {
    type Err = ParseGatewayStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "pending" => Ok(Self::Pending),
            "in_process" => Ok(Self::InProcess),
            "rejected" => Ok(Self::Rejected),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ParseGatewayStatusError(value.to_string())),
        }
    }
}

/// Raw notification, after the gateway-specific layer extracted its fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayNotification {
    /// Gateway's own id for the event, used to drop duplicates
    pub event_id: String,
    /// External reference sent with the charge
    pub external_reference: String,
    pub status: GatewayStatus,
    /// Minor units
    pub amount: u64,
}

impl GatewayNotification {
    /// Parse a notification body such as
    /// `{"event_id": "..", "external_reference": "live_cart:..", "status": "approved", "amount": 14990}`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body doesn't have that shape.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentEventKind {
    Confirmed,
    Canceled(CancelReason),
    Refunded,
}

/// Audit entry for one processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEventRecord {
    pub event_id: String,
    pub reference: CheckoutReference,
    pub kind: PaymentEventKind,
    pub amount: Option<u64>,
    pub outcome: PaymentOutcome,
    pub received_at: Timestamp,
}

/// Published once per checkout when it becomes paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPaid {
    pub reference: CheckoutReference,
    pub customer: CustomerUuid,
    pub amount_paid: u64,
    pub channel: Channel,
}
