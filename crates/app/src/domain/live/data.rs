//! Live Events Data

use vitrine::live::{LiveEventStatus, LiveEventUuid};

/// New Live Event Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLiveEvent {
    pub uuid: LiveEventUuid,
    pub title: String,
    pub status: LiveEventStatus,
    /// Zero falls back to the platform default
    pub reservation_expiry_minutes: u32,
}
