//! Maintenance manager: periodic day rollover and reward advancement.

use crate::tracker::{local_today, Tracker};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Runs rollover and reward catch-up on a fixed tick.
pub struct MaintenanceManager {
    tracker: Arc<Tracker>,
    interval: Duration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl MaintenanceManager {
    pub fn new(tracker: Arc<Tracker>, interval: Duration) -> Self {
        Self {
            tracker,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the maintenance background task.
    pub fn start(&self) {
        let tracker = self.tracker.clone();
        let stop = self.stop.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        process_maintenance(&tracker);
                    }
                }
            }
            tracing::info!("MaintenanceManager: stopped");
        });
    }

    /// Stop the maintenance manager.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

pub(crate) fn process_maintenance(tracker: &Tracker) {
    match tracker.run_maintenance(local_today()) {
        Ok(report) => {
            if report.rolled_over || report.days_rewarded > 0 {
                tracing::info!(
                    "MaintenanceManager: rolled_over={} rebuilt={} days_rewarded={}",
                    report.rolled_over,
                    report.rebuilt,
                    report.days_rewarded
                );
            }
        }
        Err(e) => tracing::error!("MaintenanceManager: pass failed: {}", e),
    }
}
