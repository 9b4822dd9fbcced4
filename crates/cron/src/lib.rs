//! Time-driven triggers for schedule entries.
//!
//! Each trigger pairs a cron expression with an enable/disable action and an
//! opaque target key. The scheduler owns no entry state: due triggers are
//! handed to a callback supplied by the owner of the entries.

pub mod error;
pub mod schedule;
pub mod service;
pub mod types;

pub use {
    error::{Error, Result},
    schedule::{parse_expr, parse_timezone},
    service::{Scheduler, TriggerFn},
    types::{SchedulerStatus, Trigger, TriggerAction, TriggerId},
};
