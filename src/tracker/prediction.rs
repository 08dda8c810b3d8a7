//! Emission forecast from the historical daily average.

use crate::db::{keys, DayRecord, DbError, Store};

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const MIN_HISTORY_DAYS: usize = 2;
pub const MAX_DAYS_AHEAD: i64 = 7;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("days ahead must be between 1 and 7, got {0}")]
    OutOfRange(i64),
    #[error("not enough data: have {have} days of history, need at least {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

/// Mean of `totals.co2` across the ledger, if it is long enough.
pub fn average_daily_co2(history: &[DayRecord]) -> Result<f64, PredictionError> {
    if history.len() < MIN_HISTORY_DAYS {
        return Err(PredictionError::InsufficientData {
            have: history.len(),
            need: MIN_HISTORY_DAYS,
        });
    }
    let total: f64 = history.iter().map(|d| d.totals.co2).sum();
    Ok(total / history.len() as f64)
}

/// Predictions are cached per (date, horizon) for the rest of the day.
pub struct Predictor {
    store: Arc<Store>,
    cache: Mutex<HashMap<(NaiveDate, i64), f64>>,
}

impl Predictor {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Projected grams over the next `days_ahead` days.
    pub fn predict(&self, days_ahead: i64, today: NaiveDate) -> Result<f64, PredictionError> {
        if !(1..=MAX_DAYS_AHEAD).contains(&days_ahead) {
            return Err(PredictionError::OutOfRange(days_ahead));
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(grams) = cache.get(&(today, days_ahead)) {
            return Ok(*grams);
        }

        let history: Vec<DayRecord> = self.store.get(keys::DAILY_HISTORY)?.unwrap_or_default();
        let grams = average_daily_co2(&history)? * days_ahead as f64;

        cache.retain(|(date, _), _| *date == today);
        cache.insert((today, days_ahead), grams);
        Ok(grams)
    }
}
