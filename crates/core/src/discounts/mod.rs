//! Discounts
//!
//! A discount is either a percentage of a price or a fixed amount taken off
//! it. Both kinds are validated on the way in so that applying one can only
//! fail on arithmetic overflow.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use thiserror::Error;

use crate::money::{self, MoneyError};

/// Largest percentage a single discount may take off.
pub const MAX_PERCENTAGE: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

/// Errors specific to discount validation and arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage outside `(0, 90]`.
    #[error("percentage discount must be within (0, 90], got {0}")]
    PercentageOutOfRange(Decimal),

    /// Fixed discount of zero.
    #[error("fixed discount must be greater than zero")]
    ZeroAmount,

    /// Fixed discount would wipe out the price it applies to.
    #[error("fixed discount of {amount} must be below the price it discounts ({price})")]
    AmountNotBelowPrice {
        /// Discount amount in minor units.
        amount: u64,

        /// Price the discount was checked against.
        price: u64,
    },

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed")]
    PercentConversion,

    /// Discount string could not be parsed.
    #[error(transparent)]
    Parse(#[from] MoneyError),
}

/// Discount configuration for products, promotional tables and live overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Take a percentage off, e.g. "30% off". Value in percent.
    PercentageOff(Decimal),

    /// Subtract a fixed amount in minor units, e.g. "R$20 off".
    AmountOff(u64),
}

impl Discount {
    /// Check the discount is well-formed regardless of the price it hits.
    ///
    /// # Errors
    ///
    /// - [`DiscountError::PercentageOutOfRange`] for percentages outside `(0, 90]`.
    /// - [`DiscountError::ZeroAmount`] for a zero fixed amount.
    pub fn validate(&self) -> Result<(), DiscountError> {
        match *self {
            Self::PercentageOff(percentage)
                if percentage <= Decimal::ZERO || percentage > MAX_PERCENTAGE =>
            {
                Err(DiscountError::PercentageOutOfRange(percentage))
            }
            Self::AmountOff(0) => Err(DiscountError::ZeroAmount),
            Self::PercentageOff(_) | Self::AmountOff(_) => Ok(()),
        }
    }

    /// Check the discount against the price it is going to be applied to.
    ///
    /// # Errors
    ///
    /// Everything [`Discount::validate`] rejects, plus
    /// [`DiscountError::AmountNotBelowPrice`] when a fixed amount is not
    /// strictly below `price`.
    pub fn validate_against(&self, price: u64) -> Result<(), DiscountError> {
        self.validate()?;

        match *self {
            Self::AmountOff(amount) if amount >= price => {
                Err(DiscountError::AmountNotBelowPrice { amount, price })
            }
            Self::PercentageOff(_) | Self::AmountOff(_) => Ok(()),
        }
    }

    /// Apply the discount to `price`, never going below zero.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentConversion`] if the percentage
    /// arithmetic overflows.
    pub fn apply(&self, price: u64) -> Result<u64, DiscountError> {
        match *self {
            Self::PercentageOff(percentage) => {
                Ok(price.saturating_sub(percent_of_minor(percentage, price)?))
            }
            Self::AmountOff(amount) => Ok(price.saturating_sub(amount)),
        }
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PercentageOff(percentage) => write!(f, "{percentage}%"),
            Self::AmountOff(amount) => f.write_str(&money::format_minor(*amount)),
        }
    }
}

impl FromStr for Discount {
    type Err = DiscountError;

    /// Parse `"30%"` as a percentage and `"20.00 BRL"` as a fixed amount.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let discount = if value.trim().ends_with('%') {
            Self::PercentageOff(money::parse_percentage(value)?)
        } else {
            Self::AmountOff(money::parse_price(value)?)
        };

        discount.validate()?;

        Ok(discount)
    }
}

/// Calculate `percentage` percent of `minor`, rounding half away from zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows
/// or the result can't be represented in minor units.
pub fn percent_of_minor(percentage: Decimal, minor: u64) -> Result<u64, DiscountError> {
    Decimal::from(minor)
        .checked_mul(percentage)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(DiscountError::PercentConversion)
}

/// Whole percent taken off `original` to reach `effective`, rounded half away
/// from zero. Zero when nothing was taken off or the original is zero.
pub fn normalized_percent(original: u64, effective: u64) -> u8 {
    if original == 0 || effective >= original {
        return 0;
    }

    Decimal::from(original - effective)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| value.checked_div(Decimal::from(original)))
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_u8())
        .unwrap_or(100)
}
