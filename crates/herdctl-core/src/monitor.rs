//! Periodic status monitor.
//!
//! A single background task probes a [`StatusSource`] on a fixed interval
//! and publishes each snapshot twice: to an `on_update` callback and to a
//! `watch` channel for late subscribers. The first probe runs immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::probe::StatusSource;
use crate::status::ServerStatus;

/// Latest snapshot, `None` until the first probe completes.
pub type StatusReceiver = watch::Receiver<Option<Arc<ServerStatus>>>;

pub struct StatusMonitor {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    paused: bool,
}

impl StatusMonitor {
    pub fn new(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            paused: false,
        }
    }

    /// Start with automatic ticking paused. The immediate first probe still
    /// runs so subscribers get an initial status.
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Spawn the monitor task on the current tokio runtime.
    pub fn start<F>(self, on_update: F) -> MonitorHandle
    where
        F: Fn(Arc<ServerStatus>) + Send + Sync + 'static,
    {
        let paused = Arc::new(AtomicBool::new(self.paused));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (latest_tx, latest_rx) = watch::channel(None);

        info!(interval_secs = self.interval.as_secs_f64(), "status monitor started");

        let task = tokio::spawn(run_loop(
            self.source,
            self.interval,
            Arc::clone(&paused),
            Arc::clone(&cancelled),
            shutdown_rx,
            latest_tx,
            on_update,
        ));

        MonitorHandle {
            paused,
            cancelled,
            shutdown: shutdown_tx,
            latest: latest_rx,
            task: Mutex::new(Some(task)),
        }
    }
}

async fn run_loop<F>(
    source: Arc<dyn StatusSource>,
    interval: Duration,
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
    latest: watch::Sender<Option<Arc<ServerStatus>>>,
    on_update: F,
) where
    F: Fn(Arc<ServerStatus>) + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first = true;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        if !first && paused.load(Ordering::Acquire) {
            continue;
        }
        first = false;

        // An in-flight probe is dropped on shutdown rather than delivered.
        let status = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            status = source.probe() => status,
        };
        if cancelled.load(Ordering::Acquire) {
            break;
        }

        debug!(state = %status.state(), "monitor tick");
        let status = Arc::new(status);
        latest.send_replace(Some(Arc::clone(&status)));
        on_update(status);
    }

    debug!("status monitor stopped");
}

/// Controls a running [`StatusMonitor`]. Dropping the handle stops the task
/// without waiting for it.
pub struct MonitorHandle {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    latest: StatusReceiver,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorHandle {
    /// Pause or resume automatic ticks. The tick schedule keeps running
    /// while paused, so resuming does not shift it.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        debug!(paused, "status monitor auto-refresh toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Flip the pause state and return the new value.
    pub fn toggle_paused(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::AcqRel);
        debug!(paused, "status monitor auto-refresh toggled");
        paused
    }

    /// Most recent snapshot, if any probe has completed.
    pub fn latest(&self) -> Option<Arc<ServerStatus>> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> StatusReceiver {
        self.latest.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the monitor. When this returns the task has exited and no
    /// further `on_update` call will happen. Safe to call more than once.
    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.shutdown.send_replace(true);

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            let _ = handle.await;
            info!("status monitor cancelled");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.shutdown.send_replace(true);
    }
}
