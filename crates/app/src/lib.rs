//! Vitrine application services: stock ledger, reservations, pricing,
//! checkout orchestration, payment reconciliation and the expiry sweeper.

pub mod clock;
pub mod config;
pub mod context;
pub mod domain;
pub mod fixtures;
pub mod listing;
pub mod observability;
pub mod shutdown;
pub mod sweeper;

#[cfg(test)]
mod test;
