//! Usage tracking: aggregation, daily rollover, rewards and forecasts.

mod aggregator;
mod prediction;
mod rewards;
mod rollover;

pub use aggregator::*;
pub use prediction::*;
pub use rewards::*;
pub use rollover::{RolloverManager, DEFAULT_RETENTION_DAYS};

use crate::config::ServerConfig;
use crate::db::{keys, DayRecord, DbError, DomainBandwidthRate, RewardState, Store, StreakState};
use crate::estimate::{
    normalize_domain, BandwidthEstimator, EmissionCalculator, LiveSignals, ParseRegionError, Region,
};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error(transparent)]
    Invalid(#[from] ParseRegionError),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Result of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub rolled_over: bool,
    pub rebuilt: bool,
    pub days_rewarded: usize,
}

/// Current local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Owns the engine components and the store they share.
pub struct Tracker {
    store: Arc<Store>,
    bandwidth: Arc<BandwidthEstimator>,
    emissions: Arc<EmissionCalculator>,
    aggregator: Aggregator,
    rollover: RolloverManager,
    rewards: RewardEngine,
    predictor: Predictor,
}

impl Tracker {
    pub fn new(store: Arc<Store>, config: &ServerConfig) -> Self {
        let bandwidth = Arc::new(BandwidthEstimator::new());
        let emissions = Arc::new(EmissionCalculator::new(bandwidth.clone(), config.region_policy));

        Self {
            aggregator: Aggregator::new(store.clone(), emissions.clone(), config.retention_days),
            rollover: RolloverManager::new(store.clone(), config.retention_days),
            rewards: RewardEngine::new(store.clone()),
            predictor: Predictor::new(store.clone()),
            store,
            bandwidth,
            emissions,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn emissions(&self) -> &EmissionCalculator {
        &self.emissions
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn rollover(&self) -> &RolloverManager {
        &self.rollover
    }

    pub fn rewards(&self) -> &RewardEngine {
        &self.rewards
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Today's record, or an empty one if nothing was recorded yet.
    pub fn get_today(&self, today: NaiveDate) -> Result<DayRecord, DbError> {
        Ok(self
            .get_history()?
            .into_iter()
            .find(|d| d.date == today)
            .unwrap_or_else(|| DayRecord::empty(today)))
    }

    pub fn get_history(&self) -> Result<Vec<DayRecord>, DbError> {
        let mut history: Vec<DayRecord> = self.store.get(keys::DAILY_HISTORY)?.unwrap_or_default();
        history.sort_by_key(|d| d.date);
        Ok(history)
    }

    pub fn get_reward_state(&self) -> Result<RewardState, DbError> {
        self.rewards.reward_state()
    }

    pub fn get_streak_state(&self) -> Result<StreakState, DbError> {
        self.rewards.streak_state()
    }

    /// The stored region name, valid or not.
    pub fn get_region(&self) -> Result<Option<String>, DbError> {
        self.store.get(keys::USER_STATE)
    }

    pub fn set_region(&self, name: &str) -> Result<Region, RegionError> {
        let region: Region = name.parse()?;
        self.store.put(keys::USER_STATE, region.name())?;
        tracing::info!("Region set to {} ({} g/kWh)", region, region.emission_factor());
        Ok(region)
    }

    /// Feed live playback signals into the bandwidth cache and mirror the
    /// cache into the store for the dashboard.
    pub fn report_live_signal(&self, domain: &str, signals: &LiveSignals) -> Option<DomainBandwidthRate> {
        let domain = normalize_domain(domain)?;
        let rate = self.bandwidth.observe(&domain, signals);

        if let Err(e) = self.store.put(keys::DYNAMIC_RATES, &self.bandwidth.dynamic_rates()) {
            tracing::error!("Failed to persist dynamic rates: {}", e);
        }
        Some(rate)
    }

    pub fn gamification_enabled(&self) -> Result<bool, DbError> {
        Ok(self.store.get(keys::GAMIFICATION_ENABLED)?.unwrap_or(true))
    }

    /// Flip the gamification flag and return the new value.
    pub fn toggle_gamification(&self) -> Result<bool, DbError> {
        self.store.transaction(|tx| {
            let enabled = !tx.get(keys::GAMIFICATION_ENABLED)?.unwrap_or(true);
            tx.put(keys::GAMIFICATION_ENABLED, &enabled)?;
            Ok(enabled)
        })
    }

    /// Roll the day over if needed, then bring rewards up to date.
    ///
    /// A missing watermark with history present triggers a full rebuild
    /// instead of incremental advancement.
    pub fn run_maintenance(&self, today: NaiveDate) -> Result<MaintenanceReport, DbError> {
        let mut report = MaintenanceReport {
            rolled_over: self.rollover.rollover_if_new_day(today)?,
            ..Default::default()
        };

        if !self.gamification_enabled()? {
            return Ok(report);
        }

        let has_completed_days = self.get_history()?.iter().any(|d| d.date < today);
        if has_completed_days && self.rewards.needs_rebuild()? {
            let summary = self.rewards.rebuild_from_history(today)?;
            report.rebuilt = true;
            report.days_rewarded = summary.days_processed;
        } else {
            report.days_rewarded = self.rewards.catch_up(today)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_store;
    use crate::estimate::RegionPolicy;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn tracker(store: Store) -> Tracker {
        let config = ServerConfig {
            region_policy: RegionPolicy::Strict,
            ..Default::default()
        };
        Tracker::new(Arc::new(store), &config)
    }

    #[test]
    fn test_set_region_validates() {
        let (_tmp, store) = temp_store();
        let tracker = tracker(store);

        assert!(matches!(tracker.set_region("Atlantis"), Err(RegionError::Invalid(_))));
        assert_eq!(tracker.get_region().unwrap(), None);

        assert_eq!(tracker.set_region("kerala").unwrap(), Region::Kerala);
        assert_eq!(tracker.get_region().unwrap().as_deref(), Some("Kerala"));
    }

    #[test]
    fn test_get_today_defaults_to_empty() {
        let (_tmp, store) = temp_store();
        let tracker = tracker(store);
        let today = tracker.get_today(date("2024-07-01")).unwrap();
        assert_eq!(today.totals.seconds, 0);
        assert!(today.domains.is_empty());
    }

    #[test]
    fn test_live_signal_changes_recorded_gb() {
        let (_tmp, store) = temp_store();
        let tracker = tracker(store);
        tracker.set_region("Goa").unwrap();
        let today = date("2024-07-01");

        let rate = tracker
            .report_live_signal(
                "https://www.youtube.com/watch?v=1",
                &LiveSignals {
                    resolution: Some(2160),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rate.gb_per_hour, 7.0);

        tracker.aggregator().record_interval("youtube.com", 3600, today).unwrap();
        let day = tracker.get_today(today).unwrap();
        assert!((day.totals.gb - 7.0).abs() < 1e-9);

        let stored: std::collections::HashMap<String, DomainBandwidthRate> =
            tracker.store().get(keys::DYNAMIC_RATES).unwrap().unwrap();
        assert!(stored.contains_key("youtube.com"));
    }

    #[test]
    fn test_maintenance_rolls_and_rewards() {
        let (_tmp, store) = temp_store();
        let tracker = tracker(store);
        tracker.set_region("Bihar").unwrap();

        let day1 = date("2024-07-01");
        let day2 = date("2024-07-02");
        let day3 = date("2024-07-03");

        tracker.aggregator().record_interval("example.org", 600, day1).unwrap();
        let report = tracker.run_maintenance(day1).unwrap();
        assert_eq!(report.days_rewarded, 0);

        tracker.aggregator().record_interval("example.org", 600, day2).unwrap();
        let report = tracker.run_maintenance(day2).unwrap();
        // No watermark yet, so the first pass rebuilds
        assert!(report.rebuilt);
        assert_eq!(report.days_rewarded, 1);

        let report = tracker.run_maintenance(day3).unwrap();
        assert!(report.rolled_over);
        assert!(!report.rebuilt);
        assert_eq!(report.days_rewarded, 1);
        assert_eq!(tracker.get_reward_state().unwrap().points, 10);
        assert_eq!(tracker.get_streak_state().unwrap(), StreakState { current: 2, max: 2 });

        // Running it again the same day changes nothing
        let again = tracker.run_maintenance(day3).unwrap();
        assert_eq!(again, MaintenanceReport::default());
    }

    #[test]
    fn test_toggle_pauses_rewards() {
        let (_tmp, store) = temp_store();
        let tracker = tracker(store);
        tracker.set_region("Goa").unwrap();

        let day1 = date("2024-07-01");
        let day2 = date("2024-07-02");
        tracker.aggregator().record_interval("example.org", 60, day1).unwrap();

        assert!(!tracker.toggle_gamification().unwrap());
        let report = tracker.run_maintenance(day2).unwrap();
        assert!(report.rolled_over);
        assert_eq!(report.days_rewarded, 0);
        assert_eq!(tracker.get_reward_state().unwrap().points, 0);

        assert!(tracker.toggle_gamification().unwrap());
        let report = tracker.run_maintenance(day2).unwrap();
        assert_eq!(report.days_rewarded, 1);
        assert_eq!(tracker.get_reward_state().unwrap().points, 5);
    }
}
