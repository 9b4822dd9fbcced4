//! Alert table and fire-report types.

use {
    herald_common::DeliveryParams,
    herald_config::{AlertRecord, ScheduleParams},
    herald_cron::TriggerId,
    serde::Serialize,
    std::fmt,
};

/// One schedule entry as held in the alert table.
#[derive(Debug, Clone)]
pub(crate) struct ScheduleEntry {
    /// Unique trigger target key, `<alert_id>/<entry_id>#<n>`.
    pub key: String,
    pub id: String,
    pub channel: String,
    pub enabled: bool,
    pub start: Option<String>,
    pub end: Option<String>,
    pub params: DeliveryParams,
    pub email_addrs: Vec<String>,
    pub triggers: Vec<TriggerId>,
}

impl ScheduleEntry {
    /// Initial enabled state: only entries without a start expression begin
    /// enabled.
    pub fn initially_enabled(params: &ScheduleParams) -> bool {
        params.start_expr().is_none()
    }

    pub fn to_params(&self) -> ScheduleParams {
        ScheduleParams {
            id: self.id.clone(),
            router_id: self.channel.clone(),
            enabled: self.enabled,
            email_addrs: self.email_addrs.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }
}

/// An alert ID with its ordered schedule entries.
#[derive(Debug, Clone)]
pub(crate) struct AlertDefinition {
    pub alert_id: String,
    pub entries: Vec<ScheduleEntry>,
}

impl AlertDefinition {
    pub fn to_record(&self) -> AlertRecord {
        AlertRecord {
            alert_id: self.alert_id.clone(),
            schedule: self.entries.iter().map(ScheduleEntry::to_params).collect(),
        }
    }

    pub fn trigger_ids(&self) -> impl Iterator<Item = TriggerId> + '_ {
        self.entries.iter().flat_map(|e| e.triggers.iter().copied())
    }
}

/// Result of adding an alert definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    /// An alert with this ID already exists; nothing was changed.
    AlreadyExists,
}

/// Why a schedule entry could not be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UnknownChannel,
    QueueFull,
    DispatcherClosed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel => write!(f, "unknown channel"),
            Self::QueueFull => write!(f, "dispatch queue full"),
            Self::DispatcherClosed => write!(f, "dispatcher closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub entry_id: String,
    pub channel: String,
    pub reason: FailureReason,
}

/// Per-entry outcome of firing an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FireReport {
    pub alert_id: String,
    /// Entries whose delivery job was queued.
    pub dispatched: Vec<String>,
    /// Disabled entries.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

impl FireReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
