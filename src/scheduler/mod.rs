//! Scheduler module: the single-writer command queue and background
//! maintenance.

mod maintenance;

pub use maintenance::*;

use crate::command::{Command, Dispatcher, Reply};
use crate::tracker::Tracker;

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Envelope = (Command, oneshot::Sender<Reply>);

/// Cloneable handle for submitting commands to the dispatcher task.
#[derive(Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<Envelope>,
}

impl CommandHandle {
    /// Queue `command` and wait for its reply.
    pub async fn send(&self, command: Command) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((command, reply_tx)).await.is_err() {
            tracing::error!("Failed to queue command: dispatcher stopped");
            return Reply::error("dispatcher stopped");
        }
        reply_rx
            .await
            .unwrap_or_else(|_| Reply::error("dispatcher dropped the reply"))
    }
}

/// Owns the dispatcher task and the maintenance manager.
pub struct Scheduler {
    tracker: Arc<Tracker>,
    handle: CommandHandle,
    maintenance_manager: Arc<MaintenanceManager>,
}

impl Scheduler {
    /// Create a new scheduler and spawn the dispatcher task.
    pub fn new(tracker: Arc<Tracker>, maintenance_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1000);

        let maintenance_manager = Arc::new(MaintenanceManager::new(tracker.clone(), maintenance_interval));

        // All commands are applied by this one task, in arrival order
        let dispatcher = Dispatcher::new(tracker.clone());
        tokio::spawn(run_command_loop(rx, dispatcher));

        Self {
            tracker,
            handle: CommandHandle { tx },
            maintenance_manager,
        }
    }

    pub fn handle(&self) -> CommandHandle {
        self.handle.clone()
    }

    /// Run one maintenance pass now, then keep running them in the background.
    pub fn start(&self) {
        tracing::info!(
            "Starting scheduler (retention {} days, region policy {:?})",
            self.tracker.rollover().retention_cap(),
            self.tracker.emissions().policy()
        );
        process_maintenance(&self.tracker);
        self.maintenance_manager.start();
    }

    pub async fn stop(&self) {
        self.maintenance_manager.stop().await;
    }
}

/// Apply queued commands one at a time.
async fn run_command_loop(mut rx: mpsc::Receiver<Envelope>, mut dispatcher: Dispatcher) {
    while let Some((command, reply_tx)) = rx.recv().await {
        let reply = dispatcher.dispatch(command, Local::now());
        if reply_tx.send(reply).is_err() {
            tracing::debug!("Dispatcher: caller went away before the reply");
        }
    }
    tracing::info!("Dispatcher: command channel closed");
}
