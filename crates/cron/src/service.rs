//! Trigger scheduler: timer loop, trigger registration and cancellation.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    chrono_tz::Tz,
    cron::Schedule,
    tokio::{
        sync::{Mutex, Notify, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    schedule::{next_run_after, parse_expr},
    types::{SchedulerStatus, Trigger, TriggerAction, TriggerId},
};

/// Callback applying a due trigger to its target.
pub type TriggerFn =
    Arc<dyn Fn(String, TriggerAction) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Idle poll interval when no trigger has a next run.
const IDLE_POLL_MS: u64 = 60_000;

struct Slot {
    trigger: Trigger,
    schedule: Schedule,
}

/// The trigger scheduler.
pub struct Scheduler {
    slots: RwLock<Vec<Slot>>,
    next_id: AtomicU64,
    timezone: Option<Tz>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    wake_notify: Arc<Notify>,
    running: RwLock<bool>,
    on_trigger: TriggerFn,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Scheduler {
    /// Create a scheduler evaluating expressions in `timezone` (local time
    /// when `None`).
    pub fn new(timezone: Option<Tz>, on_trigger: TriggerFn) -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            timezone,
            timer_handle: Mutex::new(None),
            wake_notify: Arc::new(Notify::new()),
            running: RwLock::new(false),
            on_trigger,
        })
    }

    /// Start the timer loop. Calling it again while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        self.recompute_all_next_runs().await;

        let svc = Arc::clone(self);
        let handle = tokio::spawn(async move {
            svc.timer_loop().await;
        });
        *self.timer_handle.lock().await = Some(handle);
        info!(timezone = ?self.timezone.map(|tz| tz.name()), "scheduler started");
    }

    /// Stop the timer loop.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake_notify.notify_one();

        if let Some(h) = self.timer_handle.lock().await.take() {
            h.abort();
        }
        info!("scheduler stopped");
    }

    /// Register a trigger. The returned id cancels it.
    pub async fn add(
        &self,
        expr: &str,
        action: TriggerAction,
        target: impl Into<String>,
    ) -> Result<TriggerId> {
        let schedule = parse_expr(expr)?;
        let id = TriggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let trigger = Trigger {
            id,
            expr: expr.to_string(),
            action,
            target: target.into(),
            next_run_at_ms: next_run_after(&schedule, self.timezone, now_ms()),
            last_run_at_ms: None,
        };
        debug!(
            id = %id,
            expr,
            action = ?action,
            target = %trigger.target,
            next_run_at_ms = ?trigger.next_run_at_ms,
            "trigger added"
        );

        self.slots.write().await.push(Slot { trigger, schedule });
        self.wake_notify.notify_one();
        Ok(id)
    }

    /// Remove a trigger. Returns whether it existed.
    pub async fn cancel(&self, id: TriggerId) -> bool {
        let removed = {
            let mut slots = self.slots.write().await;
            let before = slots.len();
            slots.retain(|s| s.trigger.id != id);
            slots.len() != before
        };
        if removed {
            debug!(id = %id, "trigger cancelled");
            self.wake_notify.notify_one();
        }
        removed
    }

    /// Snapshot of every registered trigger, in registration order.
    pub async fn list(&self) -> Vec<Trigger> {
        self.slots
            .read()
            .await
            .iter()
            .map(|s| s.trigger.clone())
            .collect()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let slots = self.slots.read().await;
        SchedulerStatus {
            running: *self.running.read().await,
            trigger_count: slots.len(),
            timezone: self.timezone.map(|tz| tz.name().to_string()),
            next_run_at_ms: slots.iter().filter_map(|s| s.trigger.next_run_at_ms).min(),
        }
    }

    /// Apply a trigger immediately, regardless of its schedule.
    pub async fn run(&self, id: TriggerId) -> Result<()> {
        let (target, action) = {
            let mut slots = self.slots.write().await;
            let slot = slots
                .iter_mut()
                .find(|s| s.trigger.id == id)
                .ok_or_else(|| Error::trigger_not_found(id.get()))?;
            slot.trigger.last_run_at_ms = Some(now_ms());
            (slot.trigger.target.clone(), slot.trigger.action)
        };
        info!(id = %id, target = %target, action = ?action, "trigger forced");
        (self.on_trigger)(target, action).await;
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────────────────

    async fn timer_loop(self: &Arc<Self>) {
        loop {
            if !*self.running.read().await {
                break;
            }

            let sleep_ms = self.ms_until_next_wake().await;

            if sleep_ms > 0 {
                let notify = Arc::clone(&self.wake_notify);
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {},
                    () = notify.notified() => {
                        debug!("timer loop woken by notify");
                        continue;
                    },
                }
            }

            if !*self.running.read().await {
                break;
            }

            self.process_due_triggers().await;
        }
    }

    async fn ms_until_next_wake(&self) -> u64 {
        let slots = self.slots.read().await;
        let now = now_ms();
        slots
            .iter()
            .filter_map(|s| s.trigger.next_run_at_ms)
            .map(|t| t.saturating_sub(now))
            .min()
            .unwrap_or(IDLE_POLL_MS)
    }

    async fn process_due_triggers(&self) {
        let now = now_ms();
        // Advance every due trigger past `now` under the lock so each time
        // point fires at most once, then apply outside of it.
        let due: Vec<(TriggerId, String, TriggerAction)> = {
            let mut slots = self.slots.write().await;
            let mut due = Vec::new();
            for slot in slots.iter_mut() {
                if slot.trigger.next_run_at_ms.is_some_and(|t| t <= now) {
                    slot.trigger.last_run_at_ms = Some(now);
                    slot.trigger.next_run_at_ms = next_run_after(&slot.schedule, self.timezone, now);
                    if slot.trigger.next_run_at_ms.is_none() {
                        warn!(id = %slot.trigger.id, expr = %slot.trigger.expr, "trigger has no future runs");
                    }
                    due.push((slot.trigger.id, slot.trigger.target.clone(), slot.trigger.action));
                }
            }
            due
        };

        for (id, target, action) in due {
            debug!(id = %id, target = %target, action = ?action, "trigger fired");
            (self.on_trigger)(target, action).await;
        }
    }

    async fn recompute_all_next_runs(&self) {
        let now = now_ms();
        for slot in self.slots.write().await.iter_mut() {
            slot.trigger.next_run_at_ms = next_run_after(&slot.schedule, self.timezone, now);
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::sync::Mutex as StdMutex};

    type Calls = Arc<StdMutex<Vec<(String, TriggerAction)>>>;

    fn recording() -> (TriggerFn, Calls) {
        let calls: Calls = Arc::default();
        let sink = Arc::clone(&calls);
        let f: TriggerFn = Arc::new(move |target, action| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push((target, action));
            })
        });
        (f, calls)
    }

    #[tokio::test]
    async fn add_list_cancel() {
        let (f, _) = recording();
        let svc = Scheduler::new(Some(chrono_tz::UTC), f);

        let a = svc
            .add("0 17 * * *", TriggerAction::Enable, "greg/after_hours#1")
            .await
            .unwrap();
        let b = svc
            .add("0 6 * * *", TriggerAction::Disable, "greg/after_hours#1")
            .await
            .unwrap();
        assert_ne!(a, b);

        let triggers = svc.list().await;
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].id, a);
        assert!(triggers[0].next_run_at_ms.is_some());

        assert!(svc.cancel(a).await);
        assert!(!svc.cancel(a).await);
        assert_eq!(svc.list().await.len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_bad_expression() {
        let (f, _) = recording();
        let svc = Scheduler::new(None, f);
        let err = svc
            .add("every day", TriggerAction::Enable, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidExpression { .. }));
        assert!(svc.list().await.is_empty());
    }

    #[tokio::test]
    async fn run_applies_immediately() {
        let (f, calls) = recording();
        let svc = Scheduler::new(None, f);
        let id = svc
            .add("0 17 * * *", TriggerAction::Enable, "nightly/ops#4")
            .await
            .unwrap();

        svc.run(id).await.unwrap();
        assert_eq!(calls.lock().unwrap().as_slice(), &[(
            "nightly/ops#4".to_string(),
            TriggerAction::Enable
        )]);
        assert!(svc.list().await[0].last_run_at_ms.is_some());

        svc.cancel(id).await;
        assert!(matches!(
            svc.run(id).await,
            Err(Error::TriggerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn timer_loop_fires_due_triggers() {
        let (f, calls) = recording();
        let svc = Scheduler::new(None, f);
        svc.start().await;
        svc.add("* * * * * *", TriggerAction::Disable, "db-down/pager#2")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2_200)).await;
        svc.stop().await;

        let calls = calls.lock().unwrap();
        assert!(!calls.is_empty());
        assert!(
            calls
                .iter()
                .all(|(t, a)| t == "db-down/pager#2" && *a == TriggerAction::Disable)
        );
    }

    #[tokio::test]
    async fn start_stop_status() {
        let (f, _) = recording();
        let svc = Scheduler::new(Some(chrono_tz::Europe::Paris), f);

        svc.start().await;
        svc.start().await;
        let status = svc.status().await;
        assert!(status.running);
        assert_eq!(status.trigger_count, 0);
        assert_eq!(status.timezone.as_deref(), Some("Europe/Paris"));
        assert!(status.next_run_at_ms.is_none());

        svc.stop().await;
        assert!(!svc.status().await.running);
    }
}
