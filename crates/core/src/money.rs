//! Money
//!
//! Amounts are carried as `u64` minor units (centavos) of the store currency.
//! This module parses and formats them for humans.

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;

/// The currency every amount in the store is denominated in.
pub const STORE_CURRENCY: &Currency = iso::BRL;

/// Errors raised while parsing human-written amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount string was malformed.
    #[error("invalid price `{0}`, expected e.g. `149.90 BRL`")]
    InvalidPrice(String),

    /// Currency is not the store currency.
    #[error("unsupported currency `{0}`, the store only sells in BRL")]
    UnsupportedCurrency(String),

    /// Percentage string was malformed.
    #[error("invalid percentage `{0}`, expected e.g. `15%`")]
    InvalidPercentage(String),
}

/// Parse a price such as `"149.90 BRL"` into minor units.
///
/// # Errors
///
/// Returns [`MoneyError::InvalidPrice`] when the string is not `AMOUNT CURRENCY`
/// or the amount is negative, and [`MoneyError::UnsupportedCurrency`] for any
/// currency other than BRL.
pub fn parse_price(value: &str) -> Result<u64, MoneyError> {
    let mut parts = value.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(MoneyError::InvalidPrice(value.to_string()));
    };

    if !code.eq_ignore_ascii_case(STORE_CURRENCY.iso_alpha_code) {
        return Err(MoneyError::UnsupportedCurrency(code.to_string()));
    }

    amount
        .replace(',', ".")
        .parse::<Decimal>()
        .ok()
        .and_then(|amount| amount.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|minor| minor.round_dp(0).to_u64())
        .ok_or_else(|| MoneyError::InvalidPrice(value.to_string()))
}

/// Parse a percentage such as `"15%"` into its value in percent (`15`).
///
/// # Errors
///
/// Returns [`MoneyError::InvalidPercentage`] when the string has no `%` suffix
/// or the number can't be parsed.
pub fn parse_percentage(value: &str) -> Result<Decimal, MoneyError> {
    value
        .trim()
        .strip_suffix('%')
        .and_then(|number| number.trim().replace(',', ".").parse::<Decimal>().ok())
        .ok_or_else(|| MoneyError::InvalidPercentage(value.to_string()))
}

/// Format minor units in the store currency, e.g. `R$149,90`.
pub fn format_minor(minor: u64) -> String {
    let minor = i64::try_from(minor).unwrap_or(i64::MAX);

    Money::from_minor(minor, STORE_CURRENCY).to_string()
}
