//! Cycle scheduling.
//!
//! All triggers (startup, timer, webhook, manual) feed one bounded queue of
//! capacity one, drained by a single worker that owns the [`Reconciler`].
//! Cycles therefore never overlap, and a trigger that arrives while another
//! one is already pending is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::reconciler::Reconciler;

/// What requested a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// Daemon startup.
    Startup,
    /// Periodic timer.
    Timer,
    /// Inbound webhook.
    Webhook,
    /// Manual request, such as the `check` command.
    Manual,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Startup => "startup",
            Self::Timer => "timer",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// A queued cycle request.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    /// What requested the cycle.
    pub source: TriggerSource,
    /// When it was requested.
    pub requested_at: DateTime<Utc>,
}

impl Trigger {
    /// Creates a trigger requested now.
    #[must_use]
    pub fn new(source: TriggerSource) -> Self {
        Self {
            source,
            requested_at: Utc::now(),
        }
    }
}

/// Cloneable handle for requesting cycles.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerHandle {
    /// Requests a cycle without waiting.
    ///
    /// Returns `false` when a cycle is already pending or the worker has
    /// stopped.
    #[must_use]
    pub fn request(&self, source: TriggerSource) -> bool {
        match self.tx.try_send(Trigger::new(source)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(trigger = %source, "Cycle already pending, trigger dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(trigger = %source, "Scheduler stopped, trigger dropped");
                false
            }
        }
    }

    /// Requests a manual cycle.
    #[must_use]
    pub fn request_cycle(&self) -> bool {
        self.request(TriggerSource::Manual)
    }
}

/// Single worker running reconciliation cycles.
pub struct Scheduler {
    /// Cycle engine, owned by the worker.
    reconciler: Reconciler,
    /// Queue receiver.
    rx: mpsc::Receiver<Trigger>,
    /// Handle used for the startup and timer triggers.
    handle: TriggerHandle,
    /// Timer period, if the timer is enabled.
    interval: Option<Duration>,
}

impl Scheduler {
    /// Creates a scheduler and the handle that feeds it.
    #[must_use]
    pub fn new(reconciler: Reconciler, interval: Option<Duration>) -> (Self, TriggerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let handle = TriggerHandle { tx };
        let scheduler = Self {
            reconciler,
            rx,
            handle: handle.clone(),
            interval,
        };
        (scheduler, handle)
    }

    /// Runs until `shutdown` turns true.
    ///
    /// The startup trigger is queued first. A cycle in flight when shutdown
    /// is requested completes; pending triggers are then discarded.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Self {
            mut reconciler,
            mut rx,
            handle,
            interval,
        } = self;

        let _ = handle.request(TriggerSource::Startup);

        let timer = interval.map(|period| {
            info!(interval_secs = period.as_secs(), "Periodic checks enabled");
            spawn_timer(handle.clone(), period, shutdown.clone())
        });
        if timer.is_none() {
            info!("Periodic checks disabled");
        }
        drop(handle);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown sender dropped, stopping scheduler");
                        break;
                    }
                }
                trigger = rx.recv() => match trigger {
                    Some(trigger) => {
                        let waited = Utc::now() - trigger.requested_at;
                        debug!(
                            trigger = %trigger.source,
                            queued_ms = waited.num_milliseconds(),
                            "Starting cycle"
                        );
                        reconciler.run_cycle(trigger.source).await;
                    }
                    None => break,
                },
            }
        }

        rx.close();
        let mut discarded = 0_u32;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        info!(discarded, "Scheduler stopped");
    }
}

/// Spawns the periodic trigger task. The first tick fires one period after
/// startup.
fn spawn_timer(
    handle: TriggerHandle,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = handle.request(TriggerSource::Timer);
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    })
}
