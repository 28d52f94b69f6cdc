//! Sales channels

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Where a sale happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// The regular storefront.
    Catalog,

    /// A live shopping broadcast.
    Live,
}

impl Channel {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channels a promotional table applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelScope {
    /// Both channels.
    #[default]
    All,

    /// Catalog only.
    Catalog,

    /// Live only.
    Live,
}

impl ChannelScope {
    /// Whether a sale on `channel` falls inside this scope.
    pub const fn includes(self, channel: Channel) -> bool {
        matches!(
            (self, channel),
            (Self::All, _) | (Self::Catalog, Channel::Catalog) | (Self::Live, Channel::Live)
        )
    }
}

/// Unrecognised channel name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown channel `{0}`")]
pub struct ParseChannelError(pub String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "catalog" | "catalogo" => Ok(Self::Catalog),
            "live" => Ok(Self::Live),
            _ => Err(ParseChannelError(value.to_string())),
        }
    }
}

impl FromStr for ChannelScope {
    type Err = ParseChannelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "both" => Ok(Self::All),
            "catalog" | "catalogo" => Ok(Self::Catalog),
            "live" => Ok(Self::Live),
            _ => Err(ParseChannelError(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn scope_includes_matching_channels() {
        assert!(ChannelScope::All.includes(Channel::Live), "all covers live");
        assert!(ChannelScope::All.includes(Channel::Catalog), "all covers catalog");
        assert!(ChannelScope::Live.includes(Channel::Live), "live covers live");
        assert!(!ChannelScope::Live.includes(Channel::Catalog), "live excludes catalog");
        assert!(!ChannelScope::Catalog.includes(Channel::Live), "catalog excludes live");
    }

    #[test]
    fn parses_scope_names() -> TestResult {
        assert_eq!("ALL".parse::<ChannelScope>()?, ChannelScope::All);
        assert_eq!(" live ".parse::<ChannelScope>()?, ChannelScope::Live);
        assert_eq!("catalog".parse::<Channel>()?, Channel::Catalog);
        assert!("tv".parse::<Channel>().is_err(), "tv is not a channel");

        Ok(())
    }
}
