use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::ingest::Ingestor;

/// Scheduler for periodic CRL ingestion
pub struct CrlScheduler {
    ingestor: Arc<Ingestor>,
    interval: Duration,
}

impl CrlScheduler {
    pub fn new(ingestor: Arc<Ingestor>, interval: Duration) -> Self {
        Self { ingestor, interval }
    }

    /// Start the scheduler (spawns background task)
    ///
    /// The first run starts immediately. The loop stops once `shutdown`
    /// turns true or its sender is dropped; a run already in progress is
    /// allowed to finish first.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(
            "Starting CRL scheduler with interval of {} seconds",
            self.interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Running scheduled CRL ingestion");
                        if let Err(e) = self.ingestor.ingest_all().await {
                            error!("Scheduled CRL ingestion failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("CRL scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
