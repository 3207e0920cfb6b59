use crate::config::RegistryConfig;
use crate::table::{collect_disks, DiskEntry, ExternalTools};
use crate::RegistryResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

const WORKER_THREAD_NAME: &str = "usage-monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Idle,
    Monitoring,
}

/// A refreshed disk list, pushed only when topology or usage changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorUpdate {
    pub captured_at: DateTime<Utc>,
    pub disks: Vec<DiskEntry>,
}

/// Polls the external tools on a background thread and sends the joined
/// disk list whenever the raw snapshot changes.
///
/// Updates go out on an unbounded channel whose receiver belongs to the
/// consumer, so the worker never calls into consumer code.
pub struct UsageMonitor {
    tools: ExternalTools,
    interval: Duration,
    sink: UnboundedSender<MonitorUpdate>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UsageMonitor {
    pub fn new(
        tools: ExternalTools,
        interval: Duration,
    ) -> (Self, UnboundedReceiver<MonitorUpdate>) {
        let (sink, receiver) = mpsc::unbounded_channel();
        let monitor = Self {
            tools,
            interval,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        };
        (monitor, receiver)
    }

    pub fn from_config(config: &RegistryConfig) -> (Self, UnboundedReceiver<MonitorUpdate>) {
        Self::new(ExternalTools::from_config(config), config.poll_interval)
    }

    /// Start polling. Returns `Ok(false)` if already monitoring.
    pub fn start(&self) -> RegistryResult<bool> {
        let mut worker = self.lock_worker();
        if self.running.load(Ordering::SeqCst) {
            return Ok(false);
        }

        // A worker that quit on its own (receiver dropped) still needs joining
        if let Some(stale) = worker.take() {
            let _ = stale.join();
        }

        if self.sink.is_closed() {
            warn!("Usage monitor receiver is gone, updates will be discarded");
        }

        self.running.store(true, Ordering::SeqCst);
        let context = WorkerContext {
            tools: self.tools.clone(),
            interval: self.interval,
            sink: self.sink.clone(),
            running: Arc::clone(&self.running),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || context.run());

        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                info!(interval = ?self.interval, "Usage monitor started");
                Ok(true)
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Stop polling and wait for the worker to exit. Returns `false` if
    /// nothing was running.
    pub fn stop(&self) -> bool {
        let mut worker = self.lock_worker();
        let was_running = self.running.swap(false, Ordering::SeqCst);

        let Some(handle) = worker.take() else {
            return false;
        };

        handle.thread().unpark();
        if handle.join().is_err() {
            warn!("Usage monitor worker panicked");
        }

        if was_running {
            info!("Usage monitor stopped");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> MonitorState {
        if self.is_running() {
            MonitorState::Monitoring
        } else {
            MonitorState::Idle
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for UsageMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns.
struct WorkerContext {
    tools: ExternalTools,
    interval: Duration,
    sink: UnboundedSender<MonitorUpdate>,
    running: Arc<AtomicBool>,
}

impl WorkerContext {
    fn run(self) {
        let mut last_snapshot = String::new();

        while self.running.load(Ordering::SeqCst) {
            let snapshot = self.tools.snapshot();

            if snapshot != last_snapshot {
                let disks = collect_disks(&self.tools);
                debug!(count = disks.len(), "Disk snapshot changed");

                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                let update = MonitorUpdate {
                    captured_at: Utc::now(),
                    disks,
                };
                if self.sink.send(update).is_err() {
                    debug!("Usage monitor receiver dropped, worker exiting");
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
            last_snapshot = snapshot;

            self.sleep_interval();
        }
    }

    /// Sleep for one interval, waking early when `stop` unparks us.
    fn sleep_interval(&self) {
        let deadline = Instant::now() + self.interval;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
