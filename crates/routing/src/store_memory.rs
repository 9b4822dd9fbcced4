//! In-memory store for testing.

use std::{collections::BTreeMap, sync::Mutex};

use {async_trait::async_trait, herald_config::AlertRecord};

use crate::{Error, Result, store::AlertStore};

/// In-memory store backed by a `BTreeMap`. Nothing is written to disk.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<BTreeMap<String, AlertRecord>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = AlertRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.lock().unwrap_or_else(|e| e.into_inner());
            for record in records {
                map.insert(record.alert_id.clone(), record);
            }
        }
        store
    }

    /// Make every subsequent `store`/`remove` fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn get(&self, alert_id: &str) -> Option<AlertRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(alert_id).cloned()
    }

    fn check_writable(&self) -> Result<()> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(Error::message("store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn store(&self, record: &AlertRecord) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.alert_id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, alert_id: &str) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(alert_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<AlertRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.values().cloned().collect())
    }
}
