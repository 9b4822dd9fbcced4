//! Core data types for the trigger scheduler.

use {serde::Serialize, std::fmt};

/// Cancellation handle returned when a trigger is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TriggerId(pub(crate) u64);

impl TriggerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a trigger does to its target when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    Enable,
    Disable,
}

impl TriggerAction {
    /// The enabled state the target ends up in.
    pub fn enabled(self) -> bool {
        matches!(self, Self::Enable)
    }
}

/// Snapshot of a registered trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: TriggerId,
    /// Expression as submitted.
    pub expr: String,
    pub action: TriggerAction,
    /// Opaque key handed back to the trigger callback.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<u64>,
}

/// Scheduler status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub trigger_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
}
