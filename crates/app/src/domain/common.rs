//! Types shared by orders and live bags.

use jiff::Timestamp;
use vitrine::uuids::TypedUuid;

/// Customer identity, owned by the external auth system.
#[derive(Debug)]
pub struct Customer;

pub type CustomerUuid = TypedUuid<Customer>;

/// Why a checkout needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttentionReason {
    /// Gateway charged a different amount than the checkout total.
    AmountMismatch { expected: u64, received: u64 },

    /// Paid after the holds lapsed and the stock was gone.
    OutOfStockAfterPayment,

    /// Paid after the checkout was canceled.
    PaymentAfterCancel,

    /// Payment confirmed while the checkout wasn't awaiting one.
    UnexpectedPayment { status: &'static str },

    /// Gateway refunded a paid checkout.
    Refunded,
}

impl AttentionReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::OutOfStockAfterPayment => "out_of_stock_after_payment",
            Self::PaymentAfterCancel => "payment_after_cancel",
            Self::UnexpectedPayment { .. } => "unexpected_payment",
            Self::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attention {
    pub reason: AttentionReason,
    pub flagged_at: Timestamp,
}

/// Opaque finalize inputs computed by collaborators outside the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Adjustments {
    pub shipping_fee: u64,
    pub coupon_discount: u64,
}
