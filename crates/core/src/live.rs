//! Live events

use std::{fmt, str::FromStr};

use jiff::SignedDuration;
use thiserror::Error;

use crate::{
    discounts::Discount, products::ProductUuid, promotions::PriceBase, uuids::TypedUuid,
};

/// Live event UUID
pub type LiveEventUuid = TypedUuid<LiveEvent>;

/// Hold time for live bag items when the event doesn't set one.
pub const DEFAULT_RESERVATION_EXPIRY_MINUTES: u32 = 30;

/// Broadcast status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveEventStatus {
    /// Scheduled, not yet on air.
    Planned,

    /// On air.
    Live,

    /// Broadcast finished.
    Ended,

    /// Hidden from back-office lists.
    Archived,
}

impl LiveEventStatus {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Live => "live",
            Self::Ended => "ended",
            Self::Archived => "archived",
        }
    }

    /// Whether `next` is a legal move from this status. Planned events may be
    /// called off straight to ended.
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::Live | Self::Ended)
                | (Self::Live, Self::Ended)
                | (Self::Ended, Self::Archived)
        )
    }
}

impl fmt::Display for LiveEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised live vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseLiveError {
    /// What was being parsed
    pub kind: &'static str,

    /// Offending value
    pub value: String,
}

impl FromStr for LiveEventStatus {
    type Err = ParseLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "planned" | "planejada" => Ok(Self::Planned),
            "live" | "ao_vivo" => Ok(Self::Live),
            "ended" | "encerrada" => Ok(Self::Ended),
            "archived" | "arquivada" => Ok(Self::Archived),
            _ => Err(ParseLiveError {
                kind: "live event status",
                value: value.to_string(),
            }),
        }
    }
}

/// A live shopping broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    /// Event UUID
    pub uuid: LiveEventUuid,

    /// Title
    pub title: String,

    /// Status
    pub status: LiveEventStatus,

    /// How long a claimed item is held before it lapses
    pub reservation_expiry_minutes: u32,
}

impl LiveEvent {
    /// Hold time for items claimed during this event.
    pub fn reservation_ttl(&self) -> SignedDuration {
        let minutes = match self.reservation_expiry_minutes {
            0 => DEFAULT_RESERVATION_EXPIRY_MINUTES,
            minutes => minutes,
        };

        SignedDuration::from_mins(i64::from(minutes))
    }
}

/// Whether a live product also shows in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Sold only through the broadcast while the event is active.
    ExclusiveLive,

    /// Sold in both channels.
    #[default]
    CatalogAndLive,
}

impl FromStr for Visibility {
    type Err = ParseLiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclusive_live" | "exclusivo_live" => Ok(Self::ExclusiveLive),
            "catalog_and_live" | "catalogo_e_live" => Ok(Self::CatalogAndLive),
            _ => Err(ParseLiveError {
                kind: "visibility",
                value: value.to_string(),
            }),
        }
    }
}

/// Discount that overrides everything else on the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveDiscount {
    /// Discount
    pub discount: Discount,

    /// Price the discount is taken from
    pub price_base: PriceBase,
}

/// Product featured in a live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveProduct {
    /// Event
    pub event: LiveEventUuid,

    /// Product
    pub product: ProductUuid,

    /// Catalog visibility
    pub visibility: Visibility,

    /// Hide an exclusive product from the catalog as soon as the event is planned
    pub block_from_planning: bool,

    /// Live price override
    pub discount: Option<LiveDiscount>,

    /// Maximum units sold across every bag of the event
    pub unit_limit: Option<u32>,

    /// Running order on the broadcast, lowest first
    pub priority: u32,
}

impl LiveProduct {
    /// Whether the product must disappear from the catalog while its event
    /// is in `status`.
    pub const fn hides_from_catalog(&self, status: LiveEventStatus) -> bool {
        if !matches!(self.visibility, Visibility::ExclusiveLive) {
            return false;
        }

        match status {
            LiveEventStatus::Live => true,
            LiveEventStatus::Planned => self.block_from_planning,
            LiveEventStatus::Ended | LiveEventStatus::Archived => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn featured(visibility: Visibility, block_from_planning: bool) -> LiveProduct {
        LiveProduct {
            event: LiveEventUuid::new(),
            product: ProductUuid::new(),
            visibility,
            block_from_planning,
            discount: None,
            unit_limit: None,
            priority: 0,
        }
    }

    #[test]
    fn exclusive_products_hide_while_on_air() {
        let product = featured(Visibility::ExclusiveLive, false);

        assert!(product.hides_from_catalog(LiveEventStatus::Live), "hidden on air");
        assert!(!product.hides_from_catalog(LiveEventStatus::Planned), "visible when planned");
        assert!(!product.hides_from_catalog(LiveEventStatus::Ended), "visible after the event");
    }

    #[test]
    fn planning_block_hides_before_the_broadcast() {
        let product = featured(Visibility::ExclusiveLive, true);

        assert!(product.hides_from_catalog(LiveEventStatus::Planned), "hidden when planned");
    }

    #[test]
    fn shared_products_never_hide() {
        let product = featured(Visibility::CatalogAndLive, true);

        assert!(!product.hides_from_catalog(LiveEventStatus::Live), "shared stays visible");
    }

    #[test]
    fn status_moves_forward_only() {
        assert!(LiveEventStatus::Planned.can_become(LiveEventStatus::Live), "go live");
        assert!(LiveEventStatus::Live.can_become(LiveEventStatus::Ended), "end");
        assert!(!LiveEventStatus::Ended.can_become(LiveEventStatus::Live), "no restart");
        assert!(!LiveEventStatus::Archived.can_become(LiveEventStatus::Planned), "no revival");
    }

    #[test]
    fn ttl_defaults_to_thirty_minutes() {
        let event = LiveEvent {
            uuid: LiveEventUuid::new(),
            title: "Live de Outono".to_string(),
            status: LiveEventStatus::Planned,
            reservation_expiry_minutes: 0,
        };

        assert_eq!(event.reservation_ttl(), SignedDuration::from_mins(30));
    }
}
