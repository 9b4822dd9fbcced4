//! Shared types and error helpers used across all herald crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{AlertEvent, DeliveryParams, validate_alert_id},
};
