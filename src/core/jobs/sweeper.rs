//! Periodic eviction of finished jobs.

use super::store::JobStore;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Removes finished jobs whose `finished_at` is older than the retention window.
pub struct RetentionSweeper {
    store: Arc<JobStore>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<JobStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Runs one eviction pass and returns the number of jobs removed.
    pub fn sweep_once(&self) -> usize {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let Some(cutoff) = cutoff else {
            tracing::warn!(target: "job_store", "Retention {:?} is out of range; skipping sweep.", self.retention);
            return 0;
        };

        let evicted = self.store.evict_finished_before(cutoff);
        if evicted > 0 {
            tracing::info!(target: "job_store", "Evicted {} finished jobs older than {:?}.", evicted, self.retention);
        }
        evicted
    }

    /// Spawns the sweep loop. The first pass happens one interval after start.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_once();
            }
        })
    }
}
