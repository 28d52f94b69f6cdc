//! Checkout totals

use thiserror::Error;

/// Totals arithmetic overflowed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("checkout totals overflowed")]
pub struct TotalsError;

/// Amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    /// Units
    pub quantity: u32,

    /// Charged unit price
    pub unit_price: u64,

    /// Full unit price
    pub original_unit_price: u64,
}

impl LineAmounts {
    /// Charged amount for the line.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] on overflow.
    pub fn subtotal(&self) -> Result<u64, TotalsError> {
        self.unit_price
            .checked_mul(u64::from(self.quantity))
            .ok_or(TotalsError)
    }
}

/// Checkout money summary, all in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Sum of discounted line amounts
    pub subtotal: u64,

    /// Sum taken off full prices
    pub discounts: u64,

    /// Shipping fee
    pub shipping_fee: u64,

    /// Coupon discount applied, capped at the subtotal
    pub coupon_discount: u64,

    /// Amount to charge
    pub total: u64,
}

impl Totals {
    /// Compute totals from line amounts and the opaque finalize inputs.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] on overflow.
    pub fn compute<I>(lines: I, shipping_fee: u64, coupon_discount: u64) -> Result<Self, TotalsError>
    where
        I: IntoIterator<Item = LineAmounts>,
    {
        let mut subtotal = 0_u64;
        let mut discounts = 0_u64;

        for line in lines {
            subtotal = subtotal.checked_add(line.subtotal()?).ok_or(TotalsError)?;

            let saved = line
                .original_unit_price
                .saturating_sub(line.unit_price)
                .checked_mul(u64::from(line.quantity))
                .ok_or(TotalsError)?;

            discounts = discounts.checked_add(saved).ok_or(TotalsError)?;
        }

        let coupon_discount = coupon_discount.min(subtotal);
        let total = (subtotal - coupon_discount)
            .checked_add(shipping_fee)
            .ok_or(TotalsError)?;

        Ok(Self {
            subtotal,
            discounts,
            shipping_fee,
            coupon_discount,
            total,
        })
    }
}
