//! Sweeper Config

use std::time::Duration;

use clap::Args;

use crate::sweeper::DEFAULT_SWEEP_BATCH;

/// Expiry sweeper settings.
#[derive(Debug, Args)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    #[arg(
        long,
        env = "SWEEP_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,

    /// Lapsed holds expired per sweep
    #[arg(long, env = "SWEEP_BATCH_SIZE", default_value_t = DEFAULT_SWEEP_BATCH)]
    pub sweep_batch_size: usize,
}

impl SweeperConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
