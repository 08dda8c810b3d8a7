//! Eco points, garden tiers and the low-emission streak.
//!
//! Only completed days (strictly before today) count. Each day is applied at
//! most once, tracked by the processed-date watermark.

use super::rollover::load_history;
use crate::db::{keys, DayRecord, DbError, GardenCounters, RewardState, Store, StoreTx, StreakState};

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

/// A day at or above this many grams breaks the streak.
pub const STREAK_THRESHOLD_G: f64 = 300.0;

const TREE_POINTS: u64 = 100;
const PLANT_POINTS: u64 = 50;
const SEEDLING_POINTS: u64 = 20;

/// Points earned for a completed day's CO2 total.
pub fn points_for_co2(co2: f64) -> u64 {
    if co2 > 500.0 {
        0
    } else if co2 > 400.0 {
        1
    } else if co2 > 300.0 {
        2
    } else if co2 > 200.0 {
        3
    } else if co2 > 100.0 {
        4
    } else {
        5
    }
}

/// Split cumulative points into garden tiers, largest tier first. Each tier
/// only sees the remainder left by the tiers above it.
pub fn garden_for_points(points: u64) -> GardenCounters {
    let tree = points / TREE_POINTS;
    let rest = points % TREE_POINTS;
    let plant = rest / PLANT_POINTS;
    let rest = rest % PLANT_POINTS;
    let seedling = rest / SEEDLING_POINTS;

    GardenCounters { seedling, plant, tree }
}

/// What happened when one day was folded in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub co2: f64,
    pub points_awarded: u64,
    pub streak_kept: bool,
}

/// Full gamification state as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    pub rewards: RewardState,
    pub streak: StreakState,
    pub processed_through: Option<NaiveDate>,
}

impl GamificationState {
    /// Apply one completed day's rule to the accumulators.
    fn apply_day(&mut self, day: &DayRecord) -> DayOutcome {
        let co2 = day.totals.co2;
        let points_awarded = points_for_co2(co2);
        self.rewards.points += points_awarded;
        self.rewards.tiers = garden_for_points(self.rewards.points);

        let streak_kept = co2 < STREAK_THRESHOLD_G;
        if streak_kept {
            self.streak.current += 1;
            self.streak.max = self.streak.max.max(self.streak.current);
        } else {
            self.streak.current = 0;
        }
        self.processed_through = Some(day.date);

        DayOutcome {
            date: day.date,
            co2,
            points_awarded,
            streak_kept,
        }
    }

    fn load(tx: &StoreTx<'_>) -> Result<Self, DbError> {
        Ok(Self {
            rewards: tx.get(keys::ECO_POINTS_DATA)?.unwrap_or_default(),
            streak: tx.get(keys::STREAK_DATA)?.unwrap_or_default(),
            processed_through: tx.get(keys::LAST_GAMIFICATION_PROCESSED_DATE)?,
        })
    }

    fn save(&self, tx: &StoreTx<'_>) -> Result<(), DbError> {
        tx.put(keys::ECO_POINTS_DATA, &self.rewards)?;
        tx.put(keys::STREAK_DATA, &self.streak)?;
        match self.processed_through {
            Some(date) => tx.put(keys::LAST_GAMIFICATION_PROCESSED_DATE, &date),
            None => tx.remove(keys::LAST_GAMIFICATION_PROCESSED_DATE),
        }
    }
}

/// Rebuild summary, returned to the caller for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub days_processed: usize,
    pub state: GamificationState,
}

pub struct RewardEngine {
    store: Arc<Store>,
}

impl RewardEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fold in the oldest completed day past the watermark.
    ///
    /// Returns `None` when every completed day has already been applied.
    pub fn advance_one_day(&self, today: NaiveDate) -> Result<Option<DayOutcome>, DbError> {
        self.store.transaction(|tx| {
            let mut state = GamificationState::load(tx)?;
            let history = load_history(tx)?;

            let Some(day) = history
                .iter()
                .find(|d| d.date < today && state.processed_through.map_or(true, |w| d.date > w))
            else {
                return Ok(None);
            };

            let outcome = state.apply_day(day);
            state.save(tx)?;

            tracing::info!(
                "Rewards: {} closed with {:.1} g, +{} points (total {}), streak {}",
                outcome.date,
                outcome.co2,
                outcome.points_awarded,
                state.rewards.points,
                state.streak.current
            );
            Ok(Some(outcome))
        })
    }

    /// Apply every pending completed day. Returns how many were applied.
    pub fn catch_up(&self, today: NaiveDate) -> Result<usize, DbError> {
        let mut applied = 0;
        while self.advance_one_day(today)?.is_some() {
            applied += 1;
        }
        Ok(applied)
    }

    /// Recompute points, streak and watermark from the whole ledger.
    pub fn rebuild_from_history(&self, today: NaiveDate) -> Result<RebuildSummary, DbError> {
        self.store.transaction(|tx| {
            let history = load_history(tx)?;
            let mut state = GamificationState::default();
            let completed: Vec<&DayRecord> = history.iter().filter(|d| d.date < today).collect();
            for day in &completed {
                state.apply_day(day);
            }
            state.save(tx)?;

            tracing::info!(
                "Rewards: rebuilt from {} completed days ({} points, streak {}/{})",
                completed.len(),
                state.rewards.points,
                state.streak.current,
                state.streak.max
            );
            Ok(RebuildSummary {
                days_processed: completed.len(),
                state,
            })
        })
    }

    /// Whether the watermark has never been written.
    pub fn needs_rebuild(&self) -> Result<bool, DbError> {
        Ok(self
            .store
            .get::<NaiveDate>(keys::LAST_GAMIFICATION_PROCESSED_DATE)?
            .is_none())
    }

    #[cfg(test)]
    pub fn state(&self) -> Result<GamificationState, DbError> {
        self.store.transaction(|tx| GamificationState::load(tx))
    }

    pub fn reward_state(&self) -> Result<RewardState, DbError> {
        Ok(self.store.get(keys::ECO_POINTS_DATA)?.unwrap_or_default())
    }

    pub fn streak_state(&self) -> Result<StreakState, DbError> {
        Ok(self.store.get(keys::STREAK_DATA)?.unwrap_or_default())
    }
}
