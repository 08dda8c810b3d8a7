//! CarbonTrail - browsing carbon footprint tracker
//!
//! Folds per-domain active time into daily usage, data and CO2 estimates,
//! and derives streaks, eco points and forecasts from the daily history.

mod command;
mod config;
mod db;
mod estimate;
mod scheduler;
mod session;
mod tracker;
mod web;

use config::ServerConfig;
use db::Store;
use estimate::RegionPolicy;
use scheduler::Scheduler;
use tracker::Tracker;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("carbontrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting CarbonTrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let tracker = Arc::new(Tracker::new(store, &cfg));
    if tracker.get_region()?.is_none() && cfg.region_policy == RegionPolicy::Strict {
        tracing::warn!("No region configured; intervals are dropped until one is set (PUT /api/region)");
    }
    let store = tracker.store().clone();

    // Start scheduler
    let scheduler = Scheduler::new(tracker, Duration::from_secs(cfg.maintenance_interval_secs));
    scheduler.start();

    // Start web server
    let server = Server::new(cfg, store, scheduler.handle());
    server.start().await?;

    scheduler.stop().await;
    Ok(())
}
