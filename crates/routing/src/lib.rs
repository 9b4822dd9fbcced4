//! Alert routing: the alert table, enable/disable windows driven by the
//! scheduler, bounded asynchronous dispatch to delivery channels, and the
//! persistence collaborator that mirrors alert definitions to disk.

pub mod dispatch;
pub mod error;
pub mod manager;
pub mod store;
pub mod store_memory;
pub mod store_yaml;
pub mod types;

pub use {
    dispatch::{DispatchJob, DispatchStats, Dispatcher, DispatcherConfig, SubmitError},
    error::{Context, Error, Result},
    manager::{ManagerOptions, RouteManager, validate_definition},
    store::AlertStore,
    store_memory::InMemoryStore,
    store_yaml::YamlDirStore,
    types::{AddOutcome, FailedEntry, FailureReason, FireReport},
};
