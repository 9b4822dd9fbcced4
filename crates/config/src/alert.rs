//! Persisted alert definition records.
//!
//! One record per alert, stored as YAML under `alerts_path` and accepted as
//! JSON by the management API:
//!
//! ```yaml
//! alert: greg
//! schedule:
//!   - id: all_day
//!     router_id: gmail
//!     email_addrs:
//!       - 9999999999@tmomail.net
//!   - id: after_hours
//!     start: "0 17 * * *"
//!     end: "0 6 * * *"
//!     router_id: gmail
//!     email_addrs:
//!       - john.doe@foobar.net
//! ```

use {
    herald_common::DeliveryParams,
    serde::{Deserialize, Serialize},
};

use crate::{Context, Result};

/// An alert ID together with its ordered schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "alert")]
    pub alert_id: String,
    #[serde(default)]
    pub schedule: Vec<ScheduleParams>,
}

/// One schedule entry as persisted or submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScheduleParams {
    pub id: String,
    /// Channel identifier of the target delivery channel.
    #[serde(alias = "channel", default)]
    pub router_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addrs: Vec<String>,
    /// Cron expression that enables the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Cron expression that disables the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl ScheduleParams {
    pub fn delivery_params(&self) -> DeliveryParams {
        DeliveryParams::from_recipients(&self.email_addrs)
    }

    /// Start expression, treating an empty string as unset.
    pub fn start_expr(&self) -> Option<&str> {
        self.start.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// End expression, treating an empty string as unset.
    pub fn end_expr(&self) -> Option<&str> {
        self.end.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl AlertRecord {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize alert record")
    }
}
