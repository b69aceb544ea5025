//! Snapshot scheduler
//!
//! Drives [`SnapshotJob`] on a fixed interval. Cycles never overlap: a cycle
//! that runs past the next tick delays it, and missed ticks are skipped rather
//! than replayed in a burst.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use super::job::{CycleReport, SnapshotJob};

pub struct SnapshotScheduler {
    job: Arc<SnapshotJob>,
    interval: Duration,
    run_on_start: bool,
}

impl SnapshotScheduler {
    pub fn new(job: Arc<SnapshotJob>, interval: Duration, run_on_start: bool) -> Self {
        Self {
            job,
            interval,
            run_on_start,
        }
    }

    /// Run until `shutdown_rx` yields or its sender is dropped.
    ///
    /// A failed cycle is logged and retried on the next tick.
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let start = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            assets = self.job.assets().len(),
            run_on_start = self.run_on_start,
            "Snapshot scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Snapshot scheduler stopping");
                    break;
                }
            }
        }
    }

    async fn tick(&self) -> Option<CycleReport> {
        match self.job.run_cycle().await {
            Ok(report) => {
                info!(
                    snapshots = report.snapshots,
                    alerts = report.alerts,
                    skipped = report.skipped,
                    "Snapshot cycle complete"
                );
                Some(report)
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Snapshot cycle failed");
                None
            }
        }
    }
}
