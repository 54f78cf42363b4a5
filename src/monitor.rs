//! Periodic equipment monitor
//!
//! One actor owns the repeating timer. Each tick probes the fleet and applies
//! the snapshot; the tick work is awaited inline in the actor's select loop,
//! so at most one run is ever in flight — a tick firing during a slow run is
//! delayed, never overlapped.
//!
//! ```text
//! Timer tick → check_all() → apply_snapshot() → counts logged
//!     ↑
//!     └─── Commands (Shutdown)
//! ```
//!
//! [`EquipmentMonitor`] is the owned control object around the actor: one per
//! process, mutex-guarded running state, idempotent start/stop. Stopping
//! cancels future ticks only; an in-flight tick runs to completion.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, warn};

use crate::aggregator::StatusAggregator;
use crate::reconciler::Reconciler;
use crate::store::StoreResult;

/// Default scheduler interval: 30 seconds.
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 30_000;

/// Commands accepted by the monitor actor.
#[derive(Debug)]
enum MonitorCommand {
    /// Stop ticking. The current tick, if any, finishes first.
    Shutdown,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub interval_ms: Option<u64>,
}

struct MonitorActor {
    aggregator: Arc<StatusAggregator>,
    reconciler: Arc<Reconciler>,
    command_rx: mpsc::Receiver<MonitorCommand>,
    interval_duration: Duration,
}

impl MonitorActor {
    #[instrument(skip(self), fields(interval_ms = self.interval_duration.as_millis() as u64))]
    async fn run(mut self) {
        debug!("starting equipment monitor actor");

        let mut ticker = interval(self.interval_duration);
        // A tick that would fire while the previous run is still in flight
        // is pushed back, never queued up into a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("monitor tick failed: {e}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("equipment monitor actor stopped");
    }

    /// One monitoring pass: probe the fleet, apply the snapshot.
    ///
    /// Only the initial equipment load can fail; individual probe failures
    /// are already part of the snapshot.
    async fn tick(&self) -> StoreResult<()> {
        let snapshot = self.aggregator.check_all().await?;
        let summary = self.reconciler.apply_snapshot(&snapshot).await;

        debug!(
            "tick: {} probed, {} online / {} offline, {} alert(s) raised, {} resolved",
            snapshot.len(),
            summary.marked_online,
            summary.marked_offline,
            summary.alerts_created,
            summary.alerts_resolved,
        );

        Ok(())
    }
}

struct RunningMonitor {
    command_tx: mpsc::Sender<MonitorCommand>,
    task: JoinHandle<()>,
    interval_ms: u64,
}

/// Owned handle around the monitor actor.
///
/// Exactly one of these exists per process, held by the service wiring; the
/// running/stopped state lives in a mutex so concurrent start/stop calls are
/// serialized and can never leave a dangling timer behind.
pub struct EquipmentMonitor {
    aggregator: Arc<StatusAggregator>,
    reconciler: Arc<Reconciler>,
    inner: Mutex<Option<RunningMonitor>>,
}

impl EquipmentMonitor {
    pub fn new(aggregator: Arc<StatusAggregator>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            aggregator,
            reconciler,
            inner: Mutex::new(None),
        }
    }

    /// Start the periodic monitor.
    ///
    /// Idempotent: if already running, nothing changes and the current
    /// configuration is returned. The first tick fires immediately.
    pub async fn start(&self, interval_ms: Option<u64>) -> MonitorStatus {
        let mut inner = self.inner.lock().await;

        if let Some(running) = inner.as_ref() {
            debug!(
                "monitor already running at {}ms, ignoring start",
                running.interval_ms
            );
            return MonitorStatus {
                is_running: true,
                interval_ms: Some(running.interval_ms),
            };
        }

        let interval_ms = interval_ms.unwrap_or(DEFAULT_MONITOR_INTERVAL_MS).max(1);
        let (command_tx, command_rx) = mpsc::channel(8);

        let actor = MonitorActor {
            aggregator: self.aggregator.clone(),
            reconciler: self.reconciler.clone(),
            command_rx,
            interval_duration: Duration::from_millis(interval_ms),
        };

        let task = tokio::spawn(actor.run());

        *inner = Some(RunningMonitor {
            command_tx,
            task,
            interval_ms,
        });

        debug!("monitor started with interval {interval_ms}ms");
        MonitorStatus {
            is_running: true,
            interval_ms: Some(interval_ms),
        }
    }

    /// Stop the periodic monitor.
    ///
    /// Returns `false` if it was not running. Cancellation is cooperative:
    /// the shutdown command is queued behind an in-flight tick, and this
    /// waits for the actor to finish it.
    pub async fn stop(&self) -> bool {
        // Take the slot and release the lock before waiting on the task, so
        // status reads never queue behind an in-flight tick.
        let running = self.inner.lock().await.take();
        let Some(running) = running else {
            return false;
        };

        let _ = running.command_tx.send(MonitorCommand::Shutdown).await;
        if let Err(e) = running.task.await {
            warn!("monitor task did not shut down cleanly: {e}");
        }

        debug!("monitor stopped");
        true
    }

    /// Stop (even if not running) and start with the given interval.
    pub async fn restart(&self, interval_ms: Option<u64>) -> MonitorStatus {
        self.stop().await;
        self.start(interval_ms).await
    }

    /// Current scheduler state. Pure read.
    pub async fn status(&self) -> MonitorStatus {
        let inner = self.inner.lock().await;
        match inner.as_ref() {
            Some(running) => MonitorStatus {
                is_running: true,
                interval_ms: Some(running.interval_ms),
            },
            None => MonitorStatus {
                is_running: false,
                interval_ms: None,
            },
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}
