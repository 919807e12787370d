//! Periodic driver for [`FetchCycle`].

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cycle::FetchCycle;
use super::status::{CycleReport, ServiceStatus};
use crate::error::AppError;

struct RunningJob {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Runs one cycle on `start`, then one per interval until `stop`.
///
/// Cycles never overlap: a cycle that outlasts the interval delays the next
/// tick instead of running concurrently with it.
pub struct Scheduler {
    cycle: Arc<FetchCycle>,
    status: Arc<RwLock<ServiceStatus>>,
    job: Mutex<Option<RunningJob>>,
    cycle_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(cycle: Arc<FetchCycle>) -> Self {
        Self {
            cycle,
            status: Arc::new(RwLock::new(ServiceStatus::default())),
            job: Mutex::new(None),
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.job.lock().await.is_some()
    }

    pub async fn status(&self) -> ServiceStatus {
        self.status.read().await.clone()
    }

    /// Runs the first cycle before returning, then arms the periodic trigger.
    ///
    /// # Errors
    /// `AlreadyRunning` if a previous `start` was not followed by `stop`.
    pub async fn start(&self, interval: Duration) -> Result<(), AppError> {
        let cancel = CancellationToken::new();
        {
            let mut job = self.job.lock().await;
            if job.is_some() {
                return Err(AppError::AlreadyRunning);
            }
            *job = Some(RunningJob {
                cancel: cancel.clone(),
                handle: None,
            });
        }
        self.status.write().await.running = true;
        info!("Scheduler started, interval {}s", interval.as_secs());

        run_guarded(&self.cycle, &self.status, &self.cycle_lock, &cancel).await;

        if cancel.is_cancelled() {
            return Ok(());
        }

        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.cycle),
            Arc::clone(&self.status),
            Arc::clone(&self.cycle_lock),
            cancel.clone(),
            interval,
        ));

        let mut job = self.job.lock().await;
        match job.as_mut() {
            Some(current) if !current.cancel.is_cancelled() => {
                if let Some(previous) = current.handle.replace(handle) {
                    previous.abort();
                }
            }
            // Stopped while the first cycle ran
            _ => handle.abort(),
        }
        Ok(())
    }

    /// Cancels the trigger and waits for an in-flight cycle to finish its
    /// current stage. A no-op when not running.
    pub async fn stop(&self) {
        let Some(mut job) = self.job.lock().await.take() else {
            warn!("Scheduler is not running, nothing to stop");
            return;
        };

        info!("Stopping scheduler");
        job.cancel.cancel();
        if let Some(handle) = job.handle.take()
            && let Err(e) = handle.await
            && !e.is_cancelled()
        {
            error!("Scheduler loop ended abnormally: {e}");
        }
        let _idle = self.cycle_lock.lock().await;

        self.status.write().await.running = false;
        info!("Scheduler stopped");
    }

    /// A single cycle outside the periodic loop (`--once`).
    pub async fn run_once(&self, cancel: &CancellationToken) -> CycleReport {
        run_guarded(&self.cycle, &self.status, &self.cycle_lock, cancel).await
    }
}

async fn run_loop(
    cycle: Arc<FetchCycle>,
    status: Arc<RwLock<ServiceStatus>>,
    cycle_lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                run_guarded(&cycle, &status, &cycle_lock, &cancel).await;
            }
        }
    }
}

/// Runs the cycle on its own task so a panic is recorded as an `error`
/// outcome instead of taking the scheduler down.
async fn run_guarded(
    cycle: &Arc<FetchCycle>,
    status: &RwLock<ServiceStatus>,
    cycle_lock: &Mutex<()>,
    cancel: &CancellationToken,
) -> CycleReport {
    let _running = cycle_lock.lock().await;
    let started_at = Utc::now();

    let task = {
        let cycle = Arc::clone(cycle);
        let cancel = cancel.clone();
        tokio::spawn(async move { cycle.run(&cancel).await })
    };
    let report = match task.await {
        Ok(report) => report,
        Err(e) => {
            error!("Fetch cycle crashed: {e}");
            CycleReport::crashed(started_at, e.to_string())
        }
    };

    status.write().await.record(&report);
    report
}
