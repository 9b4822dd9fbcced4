//! Configuration loading, env substitution, validation, and persisted alert
//! records.
//!
//! Config files: `herald.yml`, `herald.yaml`, `herald.toml` or `herald.json`,
//! searched in `./` then `/etc/herald/` unless a path is given explicitly.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod alert;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    alert::{AlertRecord, ScheduleParams},
    error::{Context, Error, Result},
    loader::{apply_env_credentials, find_config_file, load_config, load_config_with},
    schema::{
        ChannelConfig, DispatchConfig, EmailChannelConfig, HeraldConfig, LogFormat,
        SchedulerConfig, ServerConfig, WebhookChannelConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
