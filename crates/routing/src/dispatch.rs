//! Bounded delivery pool.
//!
//! Jobs go through a bounded queue drained by a single loop. Each job runs on
//! its own task under a semaphore permit, with a timeout, and is abandoned
//! when the dispatcher shuts down. Delivery errors end up in the logs and the
//! counters; they never reach the caller of `submit`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    herald_channels::DeliveryChannel,
    herald_common::{AlertEvent, DeliveryParams},
    herald_config::DispatchConfig,
    serde::Serialize,
    tokio::{
        sync::{Mutex, Semaphore, mpsc},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

/// Pool sizing.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity.max(1),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

/// One delivery to perform.
pub struct DispatchJob {
    pub entry_id: String,
    pub channel: Arc<dyn DeliveryChannel>,
    pub event: AlertEvent,
    pub params: DeliveryParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("dispatch queue is full")]
    QueueFull,
    #[error("dispatcher is shut down")]
    Closed,
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
}

impl DispatchStats {
    /// Jobs accepted but not yet finished.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.delivered + self.failed + self.timed_out)
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
}

pub struct Dispatcher {
    tx: mpsc::Sender<DispatchJob>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create the pool and spawn its drain loop. Must be called inside a
    /// tokio runtime.
    pub fn new(config: DispatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let counters = Arc::new(Counters::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(drain_loop(
            rx,
            Arc::new(Semaphore::new(config.workers)),
            Arc::clone(&counters),
            cancel.clone(),
            config.timeout,
        ));
        debug!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            timeout_secs = config.timeout.as_secs(),
            "dispatcher started"
        );

        Self {
            tx,
            counters,
            cancel,
            loop_handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a job without waiting.
    pub fn submit(&self, job: DispatchJob) -> Result<(), SubmitError> {
        if self.cancel.is_cancelled() {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(SubmitError::Closed);
        }
        match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(entry_id = %job.entry_id, alert_id = %job.event.alert_id, "dispatch queue full");
                Err(SubmitError::QueueFull)
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::Closed)
            },
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs and abandon queued and in-flight deliveries.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.loop_handle.lock().await.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "dispatch loop ended abnormally");
        }
        info!(stats = ?self.stats(), "dispatcher stopped");
    }
}

async fn drain_loop(
    mut rx: mpsc::Receiver<DispatchJob>,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    timeout: Duration,
) {
    loop {
        let job = tokio::select! {
            () = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let permit = tokio::select! {
            () = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let counters = Arc::clone(&counters);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let DispatchJob {
                entry_id,
                channel,
                event,
                params,
            } = job;
            let channel_id = channel.id().to_string();

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(alert_id = %event.alert_id, entry_id = %entry_id, channel = %channel_id, "delivery abandoned");
                },
                result = tokio::time::timeout(timeout, channel.deliver(&event, &params)) => match result {
                    Ok(Ok(())) => {
                        counters.delivered.fetch_add(1, Ordering::Relaxed);
                        info!(alert_id = %event.alert_id, entry_id = %entry_id, channel = %channel_id, "alert delivered");
                    },
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(alert_id = %event.alert_id, entry_id = %entry_id, channel = %channel_id, error = %e, "delivery failed");
                    },
                    Err(_) => {
                        counters.timed_out.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            alert_id = %event.alert_id,
                            entry_id = %entry_id,
                            channel = %channel_id,
                            timeout_secs = timeout.as_secs(),
                            "delivery timed out"
                        );
                    },
                },
            }
        });
    }
    debug!("dispatch loop exited");
}
