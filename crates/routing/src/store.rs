use {async_trait::async_trait, herald_config::AlertRecord};

use crate::Result;

/// Persistence backend for alert definitions.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Create or replace the record for `record.alert_id`.
    async fn store(&self, record: &AlertRecord) -> Result<()>;
    /// Remove a record. Removing a missing record is not an error.
    async fn remove(&self, alert_id: &str) -> Result<()>;
    /// Every readable record. Unreadable entries are skipped.
    async fn load_all(&self) -> Result<Vec<AlertRecord>>;
}
