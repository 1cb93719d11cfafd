use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::ScheduleSection;

use super::CollectionJob;

/// Recurring trigger for the collection job. Ticks at a fixed interval (the
/// first tick one full interval after start), runs the job under a whole-run
/// timeout, and logs the outcome; nothing awaits scheduled results. Scheduled
/// and on-demand runs may overlap — no mutual exclusion is imposed.
pub struct CollectionScheduler {
    job: Arc<CollectionJob>,
    interval: Duration,
    job_timeout: Duration,
}

impl CollectionScheduler {
    pub fn new(job: Arc<CollectionJob>, config: &ScheduleSection) -> Self {
        Self {
            job,
            interval: Duration::from_secs(config.interval_minutes.max(1) * 60),
            job_timeout: Duration::from_secs(config.job_timeout_minutes.max(1) * 60),
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = self.interval.as_secs(),
                "collection scheduler started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_once().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("collection scheduler stopped");
        });
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run_once(&self) {
        match tokio::time::timeout(self.job_timeout, self.job.run()).await {
            Ok(batch) => {
                info!(
                    posts = batch.posts.len(),
                    failed_accounts = batch.accounts_failed,
                    store_failures = batch.store_failures,
                    "scheduled collection completed"
                );
            }
            Err(_) => {
                error!(
                    timeout_secs = self.job_timeout.as_secs(),
                    "scheduled collection timed out"
                );
            }
        }
    }
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals shutdown and joins the scheduler task. An in-flight run is
    /// allowed to finish (bounded by the job timeout).
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "scheduler join error");
        }
    }
}
