//! Persisted model types.
//!
//! Field names serialize in camelCase so the stored records keep the shape the
//! dashboard reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage attributed to one domain (or to a whole day).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub seconds: u64,
    pub gb: f64,
    pub co2: f64,
}

impl UsageTotals {
    pub fn add(&mut self, other: &UsageTotals) {
        self.seconds = self.seconds.saturating_add(other.seconds);
        self.gb += other.gb;
        self.co2 += other.co2;
    }
}

/// One calendar day of usage, keyed by local date.
///
/// `totals` always equals the sum of `domains`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub domains: BTreeMap<String, UsageTotals>,
    #[serde(default)]
    pub totals: UsageTotals,
}

impl DayRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            domains: BTreeMap::new(),
            totals: UsageTotals::default(),
        }
    }

    /// Add a delta for `domain` to both the breakdown and the day totals.
    pub fn apply(&mut self, domain: &str, delta: &UsageTotals) {
        self.domains.entry(domain.to_string()).or_default().add(delta);
        self.totals.add(delta);
    }
}

/// "Today so far" mirror of the current day, stored as two maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningTotals {
    pub usage: BTreeMap<String, u64>,
    pub co2: BTreeMap<String, f64>,
}

/// Where a bandwidth figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateSource {
    Static,
    Dynamic,
    CategoryDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainBandwidthRate {
    pub domain: String,
    pub gb_per_hour: f64,
    pub source: RateSource,
    pub observed_at: DateTime<Utc>,
}

/// Garden tiers derived from cumulative points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenCounters {
    pub seedling: u64,
    pub plant: u64,
    pub tree: u64,
}

/// Cumulative eco points, stored under `ecoPointsData`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardState {
    pub points: u64,
    #[serde(rename = "counters", default)]
    pub tiers: GardenCounters,
}

/// Low-emission day streak, stored under `streakData`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current: u64,
    pub max: u64,
}
