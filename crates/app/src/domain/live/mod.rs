//! Live events

pub mod data;
mod repository;
pub mod service;

pub use service::*;
pub use vitrine::live::{LiveEvent, LiveEventStatus, LiveEventUuid, LiveProduct};
