//! Checkout lifecycle
//!
//! Catalog orders and live bags walk the same machine:
//!
//! ```text
//! draft ──(confirm)──▶ confirming ──┐
//!   │                               ├─(request payment)─▶ awaiting_payment ─(payment)─▶ paid
//!   └──────(request payment)────────┘                          ▲
//! expired ─────────────────(revive)────────────────────────────┘
//! any non-terminal stage ─▶ canceled | expired
//! ```
//!
//! The only difference between the two is whether the confirming stage
//! exists, which each status type declares through [`CheckoutStatus`].

use std::fmt;

use thiserror::Error;

/// Position in the shared machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Being built; stock already held.
    Draft,

    /// Customer is reviewing the bag.
    Confirming,

    /// Totals frozen, waiting on the gateway.
    AwaitingPayment,

    /// Paid, stock permanently decremented.
    Paid,

    /// Canceled, stock released.
    Canceled,

    /// Holds lapsed, stock released.
    Expired,
}

impl Stage {
    /// Paid and canceled never move again. Expired can only be revived.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Canceled | Self::Expired)
    }
}

/// Event driving the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Customer starts reviewing a bag.
    BeginConfirmation,

    /// Totals frozen and handed to the gateway.
    RequestPayment,

    /// Gateway confirmed the payment.
    ConfirmPayment,

    /// Holds of an expired checkout were re-acquired.
    Revive,

    /// Customer, operator or gateway canceled.
    Cancel,

    /// Holds lapsed.
    Expire,
}

/// Illegal transition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot apply {transition:?} to a checkout in {from:?}")]
pub struct TransitionError {
    /// Stage the checkout was in
    pub from: Stage,

    /// Rejected transition
    pub transition: Transition,
}

/// Shared transition table.
pub const fn next_stage(from: Stage, transition: Transition, has_confirmation: bool) -> Option<Stage> {
    use Stage::{AwaitingPayment, Canceled, Confirming, Draft, Expired, Paid};
    use Transition::{BeginConfirmation, Cancel, ConfirmPayment, Expire, RequestPayment, Revive};

    match (from, transition) {
        (Draft, BeginConfirmation) if has_confirmation => Some(Confirming),
        (Draft, RequestPayment) if !has_confirmation => Some(AwaitingPayment),
        (Confirming | AwaitingPayment, RequestPayment) | (Expired, Revive) => Some(AwaitingPayment),
        (AwaitingPayment, ConfirmPayment) => Some(Paid),
        (Draft | Confirming | AwaitingPayment, Cancel) => Some(Canceled),
        (Draft | Confirming | AwaitingPayment, Expire) => Some(Expired),
        _ => None,
    }
}

/// Status vocabulary of one checkout kind.
pub trait CheckoutStatus: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Whether the kind has a confirming stage.
    const HAS_CONFIRMATION: bool;

    /// Stage this status maps to.
    fn stage(self) -> Stage;

    /// Status for a stage, `None` for stages the kind doesn't have.
    fn from_stage(stage: Stage) -> Option<Self>;

    /// Stable lowercase name.
    fn as_str(self) -> &'static str;

    /// Apply `transition`, returning the next status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the machine has no such edge.
    fn apply(self, transition: Transition) -> Result<Self, TransitionError> {
        next_stage(self.stage(), transition, Self::HAS_CONFIRMATION)
            .and_then(Self::from_stage)
            .ok_or(TransitionError {
                from: self.stage(),
                transition,
            })
    }
}

/// Catalog order status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Created, stock held
    #[default]
    Pending,

    /// Waiting on the gateway
    AwaitingPayment,

    /// Paid
    Paid,

    /// Canceled
    Canceled,

    /// Expired
    Expired,
}

impl CheckoutStatus for OrderStatus {
    const HAS_CONFIRMATION: bool = false;

    fn stage(self) -> Stage {
        match self {
            Self::Pending => Stage::Draft,
            Self::AwaitingPayment => Stage::AwaitingPayment,
            Self::Paid => Stage::Paid,
            Self::Canceled => Stage::Canceled,
            Self::Expired => Stage::Expired,
        }
    }

    fn from_stage(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Draft => Some(Self::Pending),
            Stage::Confirming => None,
            Stage::AwaitingPayment => Some(Self::AwaitingPayment),
            Stage::Paid => Some(Self::Paid),
            Stage::Canceled => Some(Self::Canceled),
            Stage::Expired => Some(Self::Expired),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

/// Live bag status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LiveCartStatus {
    /// Collecting claims
    #[default]
    Open,

    /// Viewer reviewing the bag
    Confirming,

    /// Waiting on the gateway
    AwaitingPayment,

    /// Paid
    Paid,

    /// Canceled
    Canceled,

    /// Expired
    Expired,
}

impl CheckoutStatus for LiveCartStatus {
    const HAS_CONFIRMATION: bool = true;

    fn stage(self) -> Stage {
        match self {
            Self::Open => Stage::Draft,
            Self::Confirming => Stage::Confirming,
            Self::AwaitingPayment => Stage::AwaitingPayment,
            Self::Paid => Stage::Paid,
            Self::Canceled => Stage::Canceled,
            Self::Expired => Stage::Expired,
        }
    }

    fn from_stage(stage: Stage) -> Option<Self> {
        Some(match stage {
            Stage::Draft => Self::Open,
            Stage::Confirming => Self::Confirming,
            Stage::AwaitingPayment => Self::AwaitingPayment,
            Stage::Paid => Self::Paid,
            Stage::Canceled => Self::Canceled,
            Stage::Expired => Self::Expired,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Confirming => "confirming",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

/// Sub-state of a single live bag item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LiveCartItemStatus {
    /// Claimed, stock held
    #[default]
    Reserved,

    /// Operator confirmed the claim, stock held
    Confirmed,

    /// Taken out of the bag
    Removed,

    /// Replaced by another size
    Substituted,

    /// Canceled
    Canceled,

    /// Hold lapsed
    Expired,
}

/// Operator or system action on a bag item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemAction {
    /// Confirm a claim
    Confirm,

    /// Take out of the bag
    Remove,

    /// Swap for another size
    Substitute,

    /// Cancel
    Cancel,

    /// Hold lapsed
    Expire,

    /// Hold re-acquired after lapsing
    Revive,
}

/// Illegal item action.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot apply {action:?} to an item in {from:?}")]
pub struct ItemTransitionError {
    /// Item status
    pub from: LiveCartItemStatus,

    /// Rejected action
    pub action: ItemAction,
}

impl LiveCartItemStatus {
    /// Whether the item currently holds stock.
    pub const fn holds_stock(self) -> bool {
        matches!(self, Self::Reserved | Self::Confirmed)
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Confirmed => "confirmed",
            Self::Removed => "removed",
            Self::Substituted => "substituted",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }

    /// Apply an action.
    ///
    /// # Errors
    ///
    /// Returns [`ItemTransitionError`] for actions the status doesn't accept.
    pub const fn apply(self, action: ItemAction) -> Result<Self, ItemTransitionError> {
        match (self, action) {
            (Self::Reserved, ItemAction::Confirm) => Ok(Self::Confirmed),
            (Self::Reserved | Self::Confirmed, ItemAction::Remove) => Ok(Self::Removed),
            (Self::Reserved | Self::Confirmed, ItemAction::Substitute) => Ok(Self::Substituted),
            (Self::Reserved | Self::Confirmed, ItemAction::Cancel) => Ok(Self::Canceled),
            (Self::Reserved | Self::Confirmed, ItemAction::Expire) => Ok(Self::Expired),
            (Self::Expired, ItemAction::Revive) => Ok(Self::Reserved),
            (from, action) => Err(ItemTransitionError { from, action }),
        }
    }

    /// Status a stock-holding item is forced into when its bag reaches
    /// `stage`, if that stage is terminal.
    pub const fn forced_by(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Paid => Some(Self::Confirmed),
            Stage::Canceled => Some(Self::Canceled),
            Stage::Expired => Some(Self::Expired),
            Stage::Draft | Stage::Confirming | Stage::AwaitingPayment => None,
        }
    }
}
