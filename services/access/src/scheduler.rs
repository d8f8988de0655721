//! Periodic triggering of the anomaly scan
//!
//! [`ScanScheduler`] fires callbacks on a fixed interval. [`ScanTrigger`]
//! decides what happens when a trigger arrives while an earlier scan is
//! still running, and gives every scan its own [`JobSession`].

use anyhow::Result;
use serde::Deserialize;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::monitor::{AnomalyMonitor, ScanReport};
use crate::repositories::AuditStore;
use crate::session::{JobSession, ResourceFactory};

/// What to do with a trigger that arrives while a scan is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new trigger
    #[default]
    Skip,
    /// Start the new scan once the running one finishes
    Queue,
    /// Run both at once
    Parallel,
}

impl OverlapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapPolicy::Skip => "skip",
            OverlapPolicy::Queue => "queue",
            OverlapPolicy::Parallel => "parallel",
        }
    }
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "queue" => Ok(OverlapPolicy::Queue),
            "parallel" => Ok(OverlapPolicy::Parallel),
            other => Err(format!("unknown overlap policy: {}", other)),
        }
    }
}

/// Result of one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed(ScanReport),
    Skipped,
    Failed(String),
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs the anomaly scan under an overlap policy
pub struct ScanTrigger<F: ResourceFactory> {
    monitor: AnomalyMonitor,
    factory: Arc<F>,
    policy: OverlapPolicy,
    running: AtomicBool,
    turn: Mutex<()>,
}

impl<F> ScanTrigger<F>
where
    F: ResourceFactory,
    F::Resource: AuditStore,
{
    pub fn new(monitor: AnomalyMonitor, factory: Arc<F>, policy: OverlapPolicy) -> Self {
        Self {
            monitor,
            factory,
            policy,
            running: AtomicBool::new(false),
            turn: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub async fn fire(&self) -> TriggerOutcome {
        match self.policy {
            OverlapPolicy::Skip => {
                if self
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    info!("Anomaly scan already running, skipping trigger");
                    return TriggerOutcome::Skipped;
                }
                let _running = RunningGuard(&self.running);
                self.run_once().await
            }
            OverlapPolicy::Queue => {
                let _turn = self.turn.lock().await;
                self.run_once().await
            }
            OverlapPolicy::Parallel => self.run_once().await,
        }
    }

    /// One scan in a fresh session; the body's error wins over a commit error
    async fn run_once(&self) -> TriggerOutcome {
        let mut session = JobSession::new(Arc::clone(&self.factory));
        let outcome = self.monitor.run(&mut session).await;
        let completion = session.on_completion(&outcome).await;

        match (outcome, completion) {
            (Err(e), _) | (Ok(_), Err(e)) => {
                error!("Anomaly scan failed: {}", e);
                TriggerOutcome::Failed(e.to_string())
            }
            (Ok(report), Ok(())) => TriggerOutcome::Completed(report),
        }
    }
}

/// Fixed-interval scheduler
pub struct ScanScheduler {
    scheduler: JobScheduler,
}

impl ScanScheduler {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self { scheduler })
    }

    /// Call `callback` every `interval`, returning the job id
    pub async fn register<C, Fut>(&self, interval: Duration, callback: C) -> Result<Uuid>
    where
        C: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback = Arc::new(callback);
        let job = Job::new_repeated_async(interval, move |_, _| {
            let callback = Arc::clone(&callback);
            Box::pin(async move { callback().await })
        })?;

        let id = self.scheduler.add(job).await?;
        info!(job_id = %id, interval_secs = interval.as_secs(), "Registered periodic job");
        Ok(id)
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
