//! Checkout Config

use clap::Args;
use jiff::SignedDuration;

use crate::domain::checkout::CheckoutSettings;

/// Checkout settings.
#[derive(Debug, Args)]
pub struct CheckoutConfig {
    /// Minutes a catalog checkout holds its stock
    #[arg(
        long,
        env = "CATALOG_RESERVATION_MINUTES",
        default_value_t = 30,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    pub catalog_reservation_minutes: u32,

    /// Price change, in centavos, finalize lets through without asking
    #[arg(long, env = "PRICE_DRIFT_TOLERANCE", default_value_t = 1, global = true)]
    pub price_drift_tolerance: u64,
}

impl CheckoutConfig {
    #[must_use]
    pub fn settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            catalog_reservation_ttl: SignedDuration::from_mins(i64::from(
                self.catalog_reservation_minutes,
            )),
            price_drift_tolerance: self.price_drift_tolerance,
        }
    }
}
