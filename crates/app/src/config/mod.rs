//! Command line and environment configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use vitrine::channel::Channel;

use crate::config::{checkout::CheckoutConfig, observability::LoggingConfig, sweeper::SweeperConfig};

pub mod checkout;
pub mod observability;
pub mod sweeper;

pub use observability::LogFormat;

/// Vitrine store engine
#[derive(Debug, Parser)]
#[command(name = "vitrine", about = "Vitrine catalog and live shopping engine", long_about = None)]
pub struct Cli {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Checkout holds and pricing tolerance.
    #[command(flatten)]
    pub checkout: CheckoutConfig,

    /// YAML file the in-memory store is seeded from
    #[arg(long, env = "STORE_FIXTURE", global = true)]
    pub store_fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Seed the store and run the expiry sweeper until interrupted.
    Serve(ServeArgs),

    /// Print the listing of a channel with prices and stock per size.
    Prices(PricesArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    /// Channel to list
    #[arg(long, value_enum, default_value_t = ChannelArg::Catalog)]
    pub channel: ChannelArg,

    /// Price as of this instant instead of now, e.g. 2025-11-28T12:00:00Z
    #[arg(long)]
    pub at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelArg {
    Catalog,
    Live,
}

impl From<ChannelArg> for Channel {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::Catalog => Self::Catalog,
            ChannelArg::Live => Self::Live,
        }
    }
}

impl Cli {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}
