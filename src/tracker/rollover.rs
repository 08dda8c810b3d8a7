//! Day rollover and history retention.

use crate::db::{keys, DayRecord, DbError, RunningTotals, Store, StoreTx};

use chrono::NaiveDate;
use std::sync::Arc;

/// Default number of days kept in the history ledger.
pub const DEFAULT_RETENTION_DAYS: usize = 28;

/// Resets running totals at most once per calendar date and keeps the
/// history ledger within its retention cap.
pub struct RolloverManager {
    store: Arc<Store>,
    retention_cap: usize,
}

impl RolloverManager {
    pub fn new(store: Arc<Store>, retention_cap: usize) -> Self {
        Self {
            store,
            retention_cap: retention_cap.max(1),
        }
    }

    pub fn retention_cap(&self) -> usize {
        self.retention_cap
    }

    /// Roll over to `today` if the stored last-opened date differs.
    ///
    /// Returns `true` when a rollover happened. Safe to call from any number
    /// of triggers; only the first call for a given date does anything.
    pub fn rollover_if_new_day(&self, today: NaiveDate) -> Result<bool, DbError> {
        self.store
            .transaction(|tx| rollover_in_tx(tx, today, self.retention_cap))
    }
}

/// Rollover body, shared with interval recording so both run inside the same
/// critical section.
pub(crate) fn rollover_in_tx(tx: &StoreTx<'_>, today: NaiveDate, cap: usize) -> Result<bool, DbError> {
    let last: Option<NaiveDate> = tx.get(keys::LAST_OPENED_DATE)?;
    // A clock that steps backwards never rewinds the open day.
    if last.is_some_and(|last| last >= today) {
        return Ok(false);
    }

    let mut history = load_history(tx)?;
    let running = running_mirror(ensure_day(&mut history, today));
    let evicted = trim_history(&mut history, cap);

    tx.put(keys::USAGE, &running.usage)?;
    tx.put(keys::CO2, &running.co2)?;
    tx.put(keys::DAILY_HISTORY, &history)?;
    tx.put(keys::LAST_OPENED_DATE, &today)?;

    tracing::info!(
        "Rollover: {} -> {} ({} days retained, {} evicted)",
        last.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string()),
        today,
        history.len(),
        evicted
    );
    Ok(true)
}

/// Read the ledger sorted by ascending date with one record per date.
pub(crate) fn load_history(tx: &StoreTx<'_>) -> Result<Vec<DayRecord>, DbError> {
    let mut history: Vec<DayRecord> = tx.get(keys::DAILY_HISTORY)?.unwrap_or_default();
    history.sort_by_key(|d| d.date);
    history.dedup_by_key(|d| d.date);
    Ok(history)
}

/// Find the record for `date`, inserting an empty one in date order if absent.
pub(crate) fn ensure_day(history: &mut Vec<DayRecord>, date: NaiveDate) -> &mut DayRecord {
    let idx = match history.binary_search_by_key(&date, |d| d.date) {
        Ok(i) => i,
        Err(i) => {
            history.insert(i, DayRecord::empty(date));
            i
        }
    };
    &mut history[idx]
}

/// Drop the oldest dates until at most `cap` remain. Returns how many went.
pub(crate) fn trim_history(history: &mut Vec<DayRecord>, cap: usize) -> usize {
    let excess = history.len().saturating_sub(cap);
    history.drain(..excess).count()
}

/// Running totals matching a day's per-domain breakdown.
fn running_mirror(day: &DayRecord) -> RunningTotals {
    let mut running = RunningTotals::default();
    for (domain, usage) in &day.domains {
        running.usage.insert(domain.clone(), usage.seconds);
        running.co2.insert(domain.clone(), usage.co2);
    }
    running
}
