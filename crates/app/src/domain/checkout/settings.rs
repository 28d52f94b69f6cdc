use jiff::SignedDuration;

/// Hold time for catalog orders when nothing else is configured.
pub const DEFAULT_CATALOG_RESERVATION_TTL: SignedDuration = SignedDuration::from_mins(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub catalog_reservation_ttl: SignedDuration,
    /// Largest unit price change, in minor units, finalize lets through
    pub price_drift_tolerance: u64,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            catalog_reservation_ttl: DEFAULT_CATALOG_RESERVATION_TTL,
            price_drift_tolerance: 1,
        }
    }
}
