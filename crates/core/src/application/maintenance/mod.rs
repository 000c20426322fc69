// Compaction Scheduler
// Periodic VACUUM of every started store

use crate::domain::Store;
use crate::port::{StoreLifecycle, StoreMaintenance};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Result of one compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub reclaimed_bytes: u64,
    pub compacted: Vec<Store>,
    pub failed: Vec<Store>,
}

/// Compaction scheduler
///
/// Runs `compact` on every started store in the background. Stores that are
/// not started are skipped, never started on the scheduler's behalf.
pub struct CompactionScheduler {
    maintenance: Arc<dyn StoreMaintenance>,
    lifecycle: Arc<dyn StoreLifecycle>,
    period: Duration,
}

impl CompactionScheduler {
    /// Create a new compaction scheduler
    ///
    /// # Arguments
    /// * `maintenance` - Maintenance implementation
    /// * `lifecycle` - Used to skip stores that are not started
    /// * `period` - How often to compact
    pub fn new(
        maintenance: Arc<dyn StoreMaintenance>,
        lifecycle: Arc<dyn StoreLifecycle>,
        period: Duration,
    ) -> Self {
        Self {
            maintenance,
            lifecycle,
            period,
        }
    }

    /// Run compaction loop (background task)
    ///
    /// Should be spawned in tokio::spawn
    pub async fn run(self) {
        info!(period_secs = self.period.as_secs(), "Compaction scheduler started");

        let mut tick = interval(self.period);
        // First tick completes immediately; the stores were just verified at startup
        tick.tick().await;

        loop {
            tick.tick().await;

            info!("Running scheduled compaction...");
            let report = self.run_now().await;
            if report.failed.is_empty() {
                info!(
                    reclaimed_bytes = report.reclaimed_bytes,
                    compacted = report.compacted.len(),
                    "Scheduled compaction completed successfully"
                );
            } else {
                error!(failed = ?report.failed, "Scheduled compaction had failures");
            }
        }
    }

    /// Compact every started store now (also used for manual triggers)
    pub async fn run_now(&self) -> CompactionReport {
        let mut report = CompactionReport::default();

        for store in Store::ALL {
            if !self.lifecycle.is_started(store) {
                debug!(store = %store, "Skipping compaction of store that is not started");
                continue;
            }

            match self.maintenance.compact(store).await {
                Ok(reclaimed) => {
                    report.reclaimed_bytes += reclaimed;
                    report.compacted.push(store);
                }
                Err(e) => {
                    error!(store = %store, error = ?e, "Compaction failed");
                    report.failed.push(store);
                }
            }
        }

        report
    }
}
