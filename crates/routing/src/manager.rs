//! Route manager: the alert table and the operations on it.
//!
//! The table and every entry's `enabled` flag live behind one `RwLock`.
//! Scheduler callbacks take the same write lock to flip flags. Lock order is
//! table, then scheduler; the scheduler never holds its own lock while
//! calling back.
//!
//! Store writes happen after the table lock is released. They are ordered by
//! a separate mutex that is taken before the table lock is dropped, so the
//! store sees mutations of one ID in table order.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    chrono_tz::Tz,
    herald_channels::ChannelRegistry,
    herald_common::{AlertEvent, validate_alert_id},
    herald_config::{AlertRecord, HeraldConfig, ScheduleParams},
    herald_cron::{Scheduler, SchedulerStatus, Trigger, TriggerAction, TriggerFn, parse_expr},
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, Result,
    dispatch::{DispatchJob, DispatchStats, Dispatcher, DispatcherConfig, SubmitError},
    store::AlertStore,
    types::{AddOutcome, AlertDefinition, FailedEntry, FailureReason, FireReport, ScheduleEntry},
};

type AlertTable = BTreeMap<String, AlertDefinition>;

/// Runtime options for a [`RouteManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Timezone for start/end expressions. Local time when `None`.
    pub timezone: Option<Tz>,
    pub dispatch: DispatcherConfig,
}

impl ManagerOptions {
    pub fn from_config(config: &HeraldConfig) -> Result<Self> {
        let timezone = config
            .scheduler
            .timezone
            .as_deref()
            .map(herald_cron::parse_timezone)
            .transpose()?;
        Ok(Self {
            timezone,
            dispatch: DispatcherConfig::from(&config.dispatch),
        })
    }
}

pub struct RouteManager {
    table: Arc<RwLock<AlertTable>>,
    scheduler: Arc<Scheduler>,
    channels: Arc<ChannelRegistry>,
    dispatcher: Dispatcher,
    store: Arc<dyn AlertStore>,
    store_writes: Mutex<()>,
    next_key: AtomicU64,
}

impl RouteManager {
    /// Build a manager with an empty table. Must be called inside a tokio
    /// runtime; call [`RouteManager::start`] to load persisted alerts.
    pub fn new(
        channels: Arc<ChannelRegistry>,
        store: Arc<dyn AlertStore>,
        options: ManagerOptions,
    ) -> Arc<Self> {
        let table: Arc<RwLock<AlertTable>> = Arc::default();

        let callback_table = Arc::clone(&table);
        let on_trigger: TriggerFn = Arc::new(move |target, action| {
            let table = Arc::clone(&callback_table);
            Box::pin(async move {
                apply_trigger(&table, &target, action).await;
            })
        });

        Arc::new(Self {
            table,
            scheduler: Scheduler::new(options.timezone, on_trigger),
            channels,
            dispatcher: Dispatcher::new(options.dispatch),
            store,
            store_writes: Mutex::new(()),
            next_key: AtomicU64::new(1),
        })
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub async fn triggers(&self) -> (SchedulerStatus, Vec<Trigger>) {
        (self.scheduler.status().await, self.scheduler.list().await)
    }

    /// Load persisted alert definitions and start the scheduler.
    ///
    /// Records that fail validation are logged and skipped. Returns the
    /// number of definitions loaded.
    pub async fn start(&self) -> Result<usize> {
        let records = self.store.load_all().await?;
        let mut loaded = 0;
        {
            let mut table = self.table.write().await;
            for record in records {
                if let Err(e) = validate_definition(&record.alert_id, &record.schedule) {
                    warn!(alert_id = %record.alert_id, error = %e, "skipping invalid alert record");
                    continue;
                }
                if table.contains_key(&record.alert_id) {
                    warn!(alert_id = %record.alert_id, "skipping duplicate alert record");
                    continue;
                }
                let definition = self.build_definition(&record.alert_id, &record.schedule).await?;
                table.insert(record.alert_id.clone(), definition);
                loaded += 1;
            }
        }
        info!(count = loaded, "loaded alert definitions");

        self.scheduler.start().await;
        Ok(loaded)
    }

    /// Stop the scheduler and abandon in-flight deliveries.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.dispatcher.shutdown().await;
    }

    /// Dispatch `message` to every enabled entry of `alert_id`.
    ///
    /// Deliveries run in the background; the report only says which entries
    /// were queued, skipped or could not be queued.
    pub async fn fire(&self, alert_id: &str, message: &str) -> Result<FireReport> {
        let table = self.table.read().await;
        let definition = table
            .get(alert_id)
            .ok_or_else(|| Error::not_found(alert_id))?;

        let event = AlertEvent::new(alert_id, message);
        let mut report = FireReport {
            alert_id: alert_id.to_string(),
            ..Default::default()
        };

        for entry in &definition.entries {
            if !entry.enabled {
                debug!(alert_id, entry_id = %entry.id, "entry disabled, skipping");
                report.skipped.push(entry.id.clone());
                continue;
            }
            let Some(channel) = self.channels.get(&entry.channel) else {
                warn!(alert_id, entry_id = %entry.id, channel = %entry.channel, "no channel with this id");
                report.failed.push(failed(entry, FailureReason::UnknownChannel));
                continue;
            };
            let job = DispatchJob {
                entry_id: entry.id.clone(),
                channel,
                event: event.clone(),
                params: entry.params.clone(),
            };
            match self.dispatcher.submit(job) {
                Ok(()) => {
                    info!(alert_id, entry_id = %entry.id, channel = %entry.channel, "firing alert");
                    report.dispatched.push(entry.id.clone());
                },
                Err(SubmitError::QueueFull) => {
                    report.failed.push(failed(entry, FailureReason::QueueFull));
                },
                Err(SubmitError::Closed) => {
                    report.failed.push(failed(entry, FailureReason::DispatcherClosed));
                },
            }
        }
        Ok(report)
    }

    /// Add a new alert definition. An existing ID is left untouched.
    pub async fn add(&self, alert_id: &str, schedule: Vec<ScheduleParams>) -> Result<AddOutcome> {
        validate_definition(alert_id, &schedule)?;

        let mut table = self.table.write().await;
        if table.contains_key(alert_id) {
            debug!(alert_id, "alert already exists");
            return Ok(AddOutcome::AlreadyExists);
        }
        let definition = self.build_definition(alert_id, &schedule).await?;
        let record = definition.to_record();
        table.insert(alert_id.to_string(), definition);
        info!(alert_id, entries = record.schedule.len(), "alert added");

        let _writes = self.store_writes.lock().await;
        drop(table);
        self.persist(&record).await;
        Ok(AddOutcome::Created)
    }

    /// Remove an alert definition and cancel its triggers.
    pub async fn delete(&self, alert_id: &str) -> Result<()> {
        let mut table = self.table.write().await;
        let definition = table
            .remove(alert_id)
            .ok_or_else(|| Error::not_found(alert_id))?;
        self.cancel_triggers(&definition).await;
        info!(alert_id, "alert deleted");

        let _writes = self.store_writes.lock().await;
        drop(table);
        if let Err(e) = self.store.remove(alert_id).await {
            error!(
                target: "herald::divergence",
                alert_id,
                divergence = true,
                error = %e,
                "failed to remove persisted alert record"
            );
        }
        Ok(())
    }

    /// Replace an alert definition. The payload is validated before anything
    /// is removed; an unknown ID fails without adding.
    pub async fn update(&self, alert_id: &str, schedule: Vec<ScheduleParams>) -> Result<()> {
        validate_definition(alert_id, &schedule)?;

        let mut table = self.table.write().await;
        let old = table
            .remove(alert_id)
            .ok_or_else(|| Error::not_found(alert_id))?;
        self.cancel_triggers(&old).await;

        let definition = self.build_definition(alert_id, &schedule).await?;
        let record = definition.to_record();
        table.insert(alert_id.to_string(), definition);
        info!(alert_id, entries = record.schedule.len(), "alert updated");

        let _writes = self.store_writes.lock().await;
        drop(table);
        self.persist(&record).await;
        Ok(())
    }

    /// Snapshot of every definition, sorted by alert ID, with live enabled
    /// flags.
    pub async fn list(&self) -> Vec<AlertRecord> {
        self.table
            .read()
            .await
            .values()
            .map(AlertDefinition::to_record)
            .collect()
    }

    // ── Internal ────────────────────────────────────────────────────────

    /// Build entries with their initial state and register their triggers.
    async fn build_definition(
        &self,
        alert_id: &str,
        schedule: &[ScheduleParams],
    ) -> Result<AlertDefinition> {
        let mut definition = AlertDefinition {
            alert_id: alert_id.to_string(),
            entries: Vec::with_capacity(schedule.len()),
        };

        for params in schedule {
            let key = format!(
                "{alert_id}/{}#{}",
                params.id,
                self.next_key.fetch_add(1, Ordering::Relaxed)
            );
            let mut entry = ScheduleEntry {
                key,
                id: params.id.clone(),
                channel: params.router_id.clone(),
                enabled: ScheduleEntry::initially_enabled(params),
                start: params.start_expr().map(str::to_string),
                end: params.end_expr().map(str::to_string),
                params: params.delivery_params(),
                email_addrs: params.email_addrs.clone(),
                triggers: Vec::new(),
            };

            let wanted = [
                (entry.start.clone(), TriggerAction::Enable),
                (entry.end.clone(), TriggerAction::Disable),
            ];
            for (expr, action) in wanted {
                let Some(expr) = expr else { continue };
                match self.scheduler.add(&expr, action, entry.key.clone()).await {
                    Ok(id) => entry.triggers.push(id),
                    Err(e) => {
                        definition.entries.push(entry);
                        self.cancel_triggers(&definition).await;
                        return Err(Error::validation(e));
                    },
                }
            }

            debug!(
                alert_id,
                entry_id = %entry.id,
                channel = %entry.channel,
                enabled = entry.enabled,
                triggers = entry.triggers.len(),
                "schedule entry registered"
            );
            definition.entries.push(entry);
        }
        Ok(definition)
    }

    async fn cancel_triggers(&self, definition: &AlertDefinition) {
        for id in definition.trigger_ids() {
            self.scheduler.cancel(id).await;
        }
    }

    async fn persist(&self, record: &AlertRecord) {
        if let Err(e) = self.store.store(record).await {
            error!(
                target: "herald::divergence",
                alert_id = %record.alert_id,
                divergence = true,
                error = %e,
                "failed to persist alert record"
            );
        }
    }
}

fn failed(entry: &ScheduleEntry, reason: FailureReason) -> FailedEntry {
    FailedEntry {
        entry_id: entry.id.clone(),
        channel: entry.channel.clone(),
        reason,
    }
}

/// Check an alert ID and its schedule before touching any state.
pub fn validate_definition(alert_id: &str, schedule: &[ScheduleParams]) -> Result<()> {
    validate_alert_id(alert_id).map_err(Error::validation)?;

    let mut seen = HashSet::new();
    for (i, params) in schedule.iter().enumerate() {
        if params.id.trim().is_empty() {
            return Err(Error::validation(format!("schedule[{i}]: id is required")));
        }
        if !seen.insert(params.id.as_str()) {
            return Err(Error::validation(format!(
                "schedule[{i}]: duplicate entry id '{}'",
                params.id
            )));
        }
        if params.router_id.trim().is_empty() {
            return Err(Error::validation(format!(
                "schedule[{i}] ({}): router_id is required",
                params.id
            )));
        }
        for expr in [params.start_expr(), params.end_expr()].into_iter().flatten() {
            parse_expr(expr)
                .map_err(|e| Error::validation(format!("schedule[{i}] ({}): {e}", params.id)))?;
        }
    }
    Ok(())
}

/// Flip the entry addressed by `target`. A target that no longer exists is
/// a no-op.
async fn apply_trigger(table: &RwLock<AlertTable>, target: &str, action: TriggerAction) {
    let Some((alert_id, _)) = target.split_once('/') else {
        warn!(target, "malformed trigger target");
        return;
    };
    let mut table = table.write().await;
    let entry = table
        .get_mut(alert_id)
        .and_then(|d| d.entries.iter_mut().find(|e| e.key == target));
    match entry {
        Some(entry) => {
            entry.enabled = action.enabled();
            info!(
                alert_id,
                entry_id = %entry.id,
                channel = %entry.channel,
                enabled = entry.enabled,
                "schedule entry toggled"
            );
        },
        None => debug!(target, "trigger target no longer exists"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::store_memory::InMemoryStore,
        async_trait::async_trait,
        herald_channels::{ChannelDescription, DeliveryChannel},
        herald_common::DeliveryParams,
        std::{sync::Mutex as StdMutex, time::Duration},
        tokio::sync::Semaphore,
    };

    type Deliveries = Arc<StdMutex<Vec<(AlertEvent, DeliveryParams)>>>;

    struct RecordingChannel {
        id: String,
        deliveries: Deliveries,
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> &'static str {
            "email"
        }

        fn initialize(&mut self) -> herald_channels::Result<()> {
            Ok(())
        }

        fn describe(&self) -> ChannelDescription {
            ChannelDescription::Webhook {
                id: self.id.clone(),
                url: "memory://".into(),
                max_msg_size: 160,
            }
        }

        async fn deliver(
            &self,
            event: &AlertEvent,
            params: &DeliveryParams,
        ) -> herald_channels::Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((event.clone(), params.clone()));
            Ok(())
        }
    }

    struct Fixture {
        manager: Arc<RouteManager>,
        store: Arc<InMemoryStore>,
        deliveries: Deliveries,
    }

    fn fixture_with(store: InMemoryStore) -> Fixture {
        let deliveries: Deliveries = Arc::default();
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(RecordingChannel {
            id: "gmail".into(),
            deliveries: Arc::clone(&deliveries),
        }));
        let store = Arc::new(store);
        let manager = RouteManager::new(
            Arc::new(registry),
            Arc::clone(&store) as Arc<dyn AlertStore>,
            ManagerOptions::default(),
        );
        Fixture {
            manager,
            store,
            deliveries,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryStore::new())
    }

    fn entry(id: &str, channel: &str) -> ScheduleParams {
        ScheduleParams {
            id: id.into(),
            router_id: channel.into(),
            email_addrs: vec!["ops@example.com".into()],
            ..Default::default()
        }
    }

    fn windowed(id: &str, start: Option<&str>, end: Option<&str>) -> ScheduleParams {
        ScheduleParams {
            start: start.map(Into::into),
            end: end.map(Into::into),
            ..entry(id, "gmail")
        }
    }

    async fn wait_for_deliveries(deliveries: &Deliveries, n: usize) {
        for _ in 0..200 {
            if deliveries.lock().unwrap().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn add_applies_enabled_policy_and_persists() {
        let f = fixture();
        let outcome = f
            .manager
            .add("greg", vec![
                entry("all_day", "gmail"),
                windowed("after_hours", Some("0 17 * * *"), Some("0 6 * * *")),
                windowed("until_dawn", None, Some("0 6 * * *")),
                windowed("from_dusk", Some("0 17 * * *"), None),
            ])
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Created);

        let list = f.manager.list().await;
        let enabled: Vec<_> = list[0].schedule.iter().map(|p| p.enabled).collect();
        assert_eq!(enabled, vec![true, false, true, false]);
        assert_eq!(f.manager.scheduler().list().await.len(), 4);

        let stored = f.store.get("greg").unwrap();
        assert_eq!(stored, list[0]);
    }

    #[tokio::test]
    async fn submitted_enabled_flag_is_ignored() {
        let f = fixture();
        let mut params = windowed("w", Some("0 17 * * *"), None);
        params.enabled = true;
        f.manager.add("greg", vec![params]).await.unwrap();
        assert!(!f.manager.list().await[0].schedule[0].enabled);
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let f = fixture();
        f.manager
            .add("greg", vec![entry("a", "gmail")])
            .await
            .unwrap();
        let outcome = f
            .manager
            .add("greg", vec![entry("b", "elastic")])
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyExists);
        assert_eq!(f.manager.list().await[0].schedule[0].id, "a");
    }

    #[tokio::test]
    async fn add_rejects_invalid_payloads() {
        let f = fixture();
        let cases = vec![
            ("bad/id", vec![entry("a", "gmail")]),
            ("greg", vec![entry("", "gmail")]),
            ("greg", vec![entry("a", "gmail"), entry("a", "gmail")]),
            ("greg", vec![entry("a", "")]),
            ("greg", vec![windowed("a", Some("every evening"), None)]),
        ];
        for (alert_id, schedule) in cases {
            let err = f.manager.add(alert_id, schedule).await.unwrap_err();
            assert!(err.is_validation(), "{alert_id}: {err}");
        }
        assert!(f.manager.list().await.is_empty());
        assert!(f.manager.scheduler().list().await.is_empty());
    }

    #[tokio::test]
    async fn fire_unknown_alert_is_not_found() {
        let f = fixture();
        let err = f.manager.fire("nope", "x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn fire_dispatches_enabled_entries_only() {
        let f = fixture();
        f.manager
            .add("greg", vec![
                entry("all_day", "gmail"),
                windowed("after_hours", Some("0 17 * * *"), None),
                entry("search", "elastic"),
            ])
            .await
            .unwrap();

        let report = f.manager.fire("greg", "disk full").await.unwrap();
        assert_eq!(report.dispatched, vec!["all_day"]);
        assert_eq!(report.skipped, vec!["after_hours"]);
        assert_eq!(report.failed, vec![FailedEntry {
            entry_id: "search".into(),
            channel: "elastic".into(),
            reason: FailureReason::UnknownChannel,
        }]);

        wait_for_deliveries(&f.deliveries, 1).await;
        let deliveries = f.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, AlertEvent::new("greg", "disk full"));
        assert_eq!(
            deliveries[0].1,
            DeliveryParams::from_recipients(&["ops@example.com".into()])
        );
    }

    #[tokio::test]
    async fn triggers_flip_entries() {
        let f = fixture();
        f.manager
            .add("greg", vec![windowed(
                "after_hours",
                Some("0 17 * * *"),
                Some("0 6 * * *"),
            )])
            .await
            .unwrap();
        let triggers = f.manager.scheduler().list().await;
        let start = triggers
            .iter()
            .find(|t| t.action == TriggerAction::Enable)
            .unwrap();
        let end = triggers
            .iter()
            .find(|t| t.action == TriggerAction::Disable)
            .unwrap();

        f.manager.scheduler().run(start.id).await.unwrap();
        assert!(f.manager.list().await[0].schedule[0].enabled);
        // Repeated enables keep it enabled.
        f.manager.scheduler().run(start.id).await.unwrap();
        assert!(f.manager.list().await[0].schedule[0].enabled);

        f.manager.scheduler().run(end.id).await.unwrap();
        assert!(!f.manager.list().await[0].schedule[0].enabled);
    }

    #[tokio::test]
    async fn delete_cancels_triggers_and_removes_record() {
        let f = fixture();
        f.manager
            .add("greg", vec![windowed("w", Some("0 17 * * *"), None)])
            .await
            .unwrap();
        let trigger = f.manager.scheduler().list().await[0].id;

        f.manager.delete("greg").await.unwrap();
        assert!(f.manager.list().await.is_empty());
        assert!(f.manager.scheduler().list().await.is_empty());
        assert!(f.store.get("greg").is_none());
        assert!(f.manager.scheduler().run(trigger).await.is_err());

        let err = f.manager.delete("greg").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn stale_target_is_noop() {
        let f = fixture();
        f.manager
            .add("greg", vec![entry("a", "gmail")])
            .await
            .unwrap();
        apply_trigger(&f.manager.table, "greg/a#999", TriggerAction::Disable).await;
        apply_trigger(&f.manager.table, "gone/a#1", TriggerAction::Disable).await;
        apply_trigger(&f.manager.table, "malformed", TriggerAction::Disable).await;
        assert!(f.manager.list().await[0].schedule[0].enabled);
    }

    #[tokio::test]
    async fn update_replaces_definition() {
        let f = fixture();
        f.manager
            .add("greg", vec![windowed("old", Some("0 17 * * *"), None)])
            .await
            .unwrap();

        f.manager
            .update("greg", vec![entry("new", "gmail")])
            .await
            .unwrap();
        let list = f.manager.list().await;
        assert_eq!(list[0].schedule.len(), 1);
        assert_eq!(list[0].schedule[0].id, "new");
        assert!(f.manager.scheduler().list().await.is_empty());
        assert_eq!(f.store.get("greg").unwrap().schedule[0].id, "new");
    }

    #[tokio::test]
    async fn update_unknown_or_invalid_changes_nothing() {
        let f = fixture();
        let err = f
            .manager
            .update("ghost", vec![entry("a", "gmail")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(f.manager.list().await.is_empty());

        f.manager
            .add("greg", vec![entry("a", "gmail")])
            .await
            .unwrap();
        let err = f
            .manager
            .update("greg", vec![windowed("a", Some("bogus"), None)])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(f.manager.list().await[0].schedule[0].id, "a");
    }

    #[tokio::test]
    async fn timer_loop_enables_entry() {
        let f = fixture();
        f.manager.start().await.unwrap();
        f.manager
            .add("tick", vec![windowed("every_second", Some("* * * * * *"), None)])
            .await
            .unwrap();

        let mut enabled = false;
        for _ in 0..300 {
            if f.manager.list().await[0].schedule[0].enabled {
                enabled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(enabled, "start trigger never fired");

        let report = f.manager.fire("tick", "now").await.unwrap();
        assert_eq!(report.dispatched, vec!["every_second"]);
        wait_for_deliveries(&f.deliveries, 1).await;
        assert_eq!(f.deliveries.lock().unwrap().len(), 1);
        f.manager.shutdown().await;
    }

    /// Store whose writes wait until the test adds a permit.
    struct GatedStore {
        gate: Semaphore,
        inner: InMemoryStore,
    }

    #[async_trait]
    impl AlertStore for GatedStore {
        async fn store(&self, record: &AlertRecord) -> Result<()> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| Error::message(e.to_string()))?;
            self.inner.store(record).await
        }

        async fn remove(&self, alert_id: &str) -> Result<()> {
            self.inner.remove(alert_id).await
        }

        async fn load_all(&self) -> Result<Vec<AlertRecord>> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn slow_store_does_not_block_fire() {
        let deliveries: Deliveries = Arc::default();
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(RecordingChannel {
            id: "gmail".into(),
            deliveries: Arc::clone(&deliveries),
        }));
        let store = Arc::new(GatedStore {
            gate: Semaphore::new(0),
            inner: InMemoryStore::new(),
        });
        let manager = RouteManager::new(
            Arc::new(registry),
            Arc::clone(&store) as Arc<dyn AlertStore>,
            ManagerOptions::default(),
        );

        let adding = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.add("greg", vec![entry("a", "gmail")]).await }
        });

        // The alert fires while its record is still waiting on the store.
        let report = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(report) = manager.fire("greg", "disk full").await {
                    return report;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(report.dispatched, vec!["a"]);
        assert!(store.inner.get("greg").is_none());

        store.gate.add_permits(1);
        assert_eq!(adding.await.unwrap().unwrap(), AddOutcome::Created);
        assert!(store.inner.get("greg").is_some());
        wait_for_deliveries(&deliveries, 1).await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn persistence_failure_keeps_table() {
        let f = fixture();
        f.store.fail_writes(true);
        let outcome = f
            .manager
            .add("greg", vec![entry("a", "gmail")])
            .await
            .unwrap();
        assert_eq!(outcome, AddOutcome::Created);
        assert_eq!(f.manager.list().await.len(), 1);
        assert!(f.store.get("greg").is_none());

        f.manager.delete("greg").await.unwrap();
        assert!(f.manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn start_loads_valid_records() {
        let store = InMemoryStore::with_records([
            AlertRecord {
                alert_id: "greg".into(),
                schedule: vec![windowed("w", Some("0 17 * * *"), Some("0 6 * * *"))],
            },
            AlertRecord {
                alert_id: "broken".into(),
                schedule: vec![windowed("w", Some("whenever"), None)],
            },
        ]);
        let f = fixture_with(store);

        assert_eq!(f.manager.start().await.unwrap(), 1);
        let list = f.manager.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].alert_id, "greg");
        assert!(!list[0].schedule[0].enabled);

        let (status, triggers) = f.manager.triggers().await;
        assert!(status.running);
        assert_eq!(triggers.len(), 2);

        f.manager.shutdown().await;
        assert!(!f.manager.scheduler().status().await.running);
        let report = f.manager.fire("greg", "late").await.unwrap();
        assert!(report.dispatched.is_empty());
    }

    #[test]
    fn options_from_config() {
        let mut config = HeraldConfig::default();
        config.scheduler.timezone = Some("Europe/Paris".into());
        config.dispatch.workers = 2;
        let options = ManagerOptions::from_config(&config).unwrap();
        assert_eq!(options.timezone, Some(chrono_tz::Europe::Paris));
        assert_eq!(options.dispatch.workers, 2);

        config.scheduler.timezone = Some("Mars/Olympus".into());
        assert!(ManagerOptions::from_config(&config).is_err());
    }
}
