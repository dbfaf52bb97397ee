//! Background data refresh system
//!
//! Periodically forces a backfill from upstream so the store tracks new
//! launches, and reports progress to observers over a tokio channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info};

use crate::backfill::BackfillCoordinator;

/// Messages sent from the background refresh to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshMessage {
    /// Refresh started
    RefreshStarted,
    /// Refresh completed
    RefreshCompleted {
        /// Number of launches upserted
        processed: usize,
    },
    /// An error occurred during refresh
    RefreshError(String),
}

/// Configuration for the refresh schedule
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between forced refreshes
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    /// Requests an out-of-band refresh
    trigger_tx: mpsc::Sender<()>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the background refresh task
    ///
    /// # Arguments
    /// * `config` - Configuration for the refresh interval
    /// * `backfill` - Coordinator whose `ensure_fresh(true)` runs on every tick
    ///
    /// # Returns
    /// A RefreshHandle that receives updates via the `receiver` channel
    pub fn spawn(config: RefreshConfig, backfill: Arc<BackfillCoordinator>) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = config.enabled.then(move || {
            let interval = config.interval;
            info!(interval_secs = interval.as_secs(), "Starting scheduled refresh");

            tokio::spawn(async move {
                let mut ticker = refresh_ticker(interval);
                // Skip the first tick (immediate)
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        Some(()) = trigger_rx.recv() => {}
                        _ = shutdown_rx.recv() => break,
                    }

                    run_refresh(&backfill, &msg_tx).await;
                }

                info!("Scheduled refresh stopped");
            })
        });

        Self {
            receiver: msg_rx,
            trigger_tx,
            shutdown_tx,
            task,
        }
    }

    /// Requests an immediate refresh
    ///
    /// Has no effect when refresh is disabled. A request made while one is
    /// already pending is merged into it.
    pub fn request_refresh(&self) {
        let _ = self.trigger_tx.try_send(());
    }

    /// Stops the background task and waits for an in-flight refresh to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Interval whose missed ticks are delayed rather than replayed after a slow refresh
fn refresh_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Runs one forced refresh and reports the outcome
///
/// Failures are only logged; the next tick retries.
async fn run_refresh(backfill: &BackfillCoordinator, tx: &mpsc::Sender<RefreshMessage>) {
    let _ = tx.try_send(RefreshMessage::RefreshStarted);

    match backfill.ensure_fresh(true).await {
        Ok(processed) => {
            info!(processed, "Scheduled refresh finished");
            let _ = tx.try_send(RefreshMessage::RefreshCompleted { processed });
        }
        Err(e) => {
            error!(error = %e, "Scheduled refresh failed");
            let _ = tx.try_send(RefreshMessage::RefreshError(e.to_string()));
        }
    }
}
