//! Configuration module for CarbonTrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::estimate::RegionPolicy;
use crate::tracker::DEFAULT_RETENTION_DAYS;

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the JSON API (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "carbontrail.db")
    pub db_path: String,
    /// Behavior when no valid region is configured (default: strict)
    pub region_policy: RegionPolicy,
    /// Days kept in the history ledger (default: 28)
    pub retention_days: usize,
    /// Seconds between rollover/reward maintenance passes (default: 60)
    pub maintenance_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "carbontrail.db".to_string(),
            region_policy: RegionPolicy::Strict,
            retention_days: DEFAULT_RETENTION_DAYS,
            maintenance_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CARBONTRAIL_HTTP_PORT`: HTTP port (default: 8080)
    /// - `CARBONTRAIL_DB_PATH`: Database file path (default: "carbontrail.db")
    /// - `CARBONTRAIL_REGION_POLICY`: `strict` or `lenient` (default: strict)
    /// - `CARBONTRAIL_RETENTION_DAYS`: history cap, at least 1 (default: 28)
    /// - `CARBONTRAIL_MAINTENANCE_SECS`: maintenance tick, at least 1 (default: 60)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = lookup("CARBONTRAIL_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("CARBONTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(policy) = lookup("CARBONTRAIL_REGION_POLICY") {
            match policy.parse() {
                Ok(p) => cfg.region_policy = p,
                Err(e) => tracing::warn!("Ignoring CARBONTRAIL_REGION_POLICY: {}", e),
            }
        }

        if let Some(days) = lookup("CARBONTRAIL_RETENTION_DAYS")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|d| *d >= 1)
        {
            cfg.retention_days = days;
        }

        if let Some(secs) = lookup("CARBONTRAIL_MAINTENANCE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s >= 1)
        {
            cfg.maintenance_interval_secs = secs;
        }

        cfg
    }
}
