//! Usage aggregator: folds active intervals into running totals and the
//! day-bucketed history ledger.
//!
//! Every call is additive. Replaying an interval counts it twice, so the
//! activity observer must report each second of browsing exactly once.

use super::rollover::{ensure_day, load_history, rollover_in_tx, trim_history};
use crate::db::{keys, DbError, RunningTotals, Store, UsageTotals};
use crate::estimate::{normalize_domain, EmissionCalculator};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Longest single interval accepted; anything above a full day is bogus.
pub const MAX_INTERVAL_SECONDS: i64 = 86_400;

/// A span of focused browsing on one domain, as reported by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInterval {
    pub domain: String,
    pub seconds: i64,
}

/// Why an interval was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    EmptyDomain,
    NonPositiveSeconds,
    ImplausibleSeconds,
    MissingRegion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecordOutcome {
    Recorded {
        domain: String,
        date: NaiveDate,
        seconds: u64,
        gb: f64,
        co2: f64,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl RecordOutcome {
    fn skipped(reason: SkipReason) -> Self {
        RecordOutcome::Skipped { reason }
    }
}

pub struct Aggregator {
    store: Arc<Store>,
    emissions: Arc<EmissionCalculator>,
    retention_cap: usize,
}

impl Aggregator {
    pub fn new(store: Arc<Store>, emissions: Arc<EmissionCalculator>, retention_cap: usize) -> Self {
        Self {
            store,
            emissions,
            retention_cap: retention_cap.max(1),
        }
    }

    /// Record `seconds` of activity on `domain` against `today`.
    ///
    /// Running totals and today's record are updated in one transaction.
    /// Invalid input and a missing region are reported as skips and leave
    /// the store untouched.
    pub fn record_interval(&self, domain: &str, seconds: i64, today: NaiveDate) -> Result<RecordOutcome, DbError> {
        let Some(domain) = normalize_domain(domain) else {
            return Ok(RecordOutcome::skipped(SkipReason::EmptyDomain));
        };
        if seconds <= 0 {
            return Ok(RecordOutcome::skipped(SkipReason::NonPositiveSeconds));
        }
        if seconds > MAX_INTERVAL_SECONDS {
            return Ok(RecordOutcome::skipped(SkipReason::ImplausibleSeconds));
        }
        let seconds = seconds as u64;

        self.store.transaction(|tx| {
            let region: Option<String> = tx.get(keys::USER_STATE)?;
            let Some(estimate) = self.emissions.estimate_usage(&domain, seconds, region.as_deref()) else {
                return Ok(RecordOutcome::skipped(SkipReason::MissingRegion));
            };

            // A new date resets the running totals before this interval lands.
            rollover_in_tx(tx, today, self.retention_cap)?;

            let mut running = RunningTotals {
                usage: tx.get(keys::USAGE)?.unwrap_or_default(),
                co2: tx.get(keys::CO2)?.unwrap_or_default(),
            };
            let used = running.usage.entry(domain.clone()).or_insert(0);
            *used = used.saturating_add(seconds);
            *running.co2.entry(domain.clone()).or_insert(0.0) += estimate.co2;

            let delta = UsageTotals {
                seconds,
                gb: estimate.gb,
                co2: estimate.co2,
            };
            let mut history = load_history(tx)?;
            ensure_day(&mut history, today).apply(&domain, &delta);
            trim_history(&mut history, self.retention_cap);

            tx.put(keys::USAGE, &running.usage)?;
            tx.put(keys::CO2, &running.co2)?;
            tx.put(keys::DAILY_HISTORY, &history)?;

            tracing::debug!(
                "Aggregator: {} +{}s ({:.4} GB, {:.3} g) on {}",
                domain,
                seconds,
                estimate.gb,
                estimate.co2,
                today
            );

            Ok(RecordOutcome::Recorded {
                domain: domain.clone(),
                date: today,
                seconds,
                gb: estimate.gb,
                co2: estimate.co2,
            })
        })
    }

    /// Per-domain seconds and grams accumulated today.
    pub fn running_totals(&self) -> Result<RunningTotals, DbError> {
        Ok(RunningTotals {
            usage: self.store.get::<BTreeMap<String, u64>>(keys::USAGE)?.unwrap_or_default(),
            co2: self.store.get::<BTreeMap<String, f64>>(keys::CO2)?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{temp_store, DayRecord};
    use crate::estimate::{BandwidthEstimator, RegionPolicy};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn aggregator(store: Arc<Store>, policy: RegionPolicy) -> Aggregator {
        let emissions = Arc::new(EmissionCalculator::new(Arc::new(BandwidthEstimator::new()), policy));
        Aggregator::new(store, emissions, 28)
    }

    fn history(store: &Store) -> Vec<DayRecord> {
        store.get(keys::DAILY_HISTORY).unwrap().unwrap_or_default()
    }

    #[test]
    fn test_records_youtube_hour() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Maharashtra").unwrap();
        let agg = aggregator(store.clone(), RegionPolicy::Strict);

        let outcome = agg.record_interval("www.youtube.com", 3600, date("2024-06-01")).unwrap();
        match outcome {
            RecordOutcome::Recorded { domain, seconds, gb, co2, .. } => {
                assert_eq!(domain, "youtube.com");
                assert_eq!(seconds, 3600);
                assert!((gb - 1.5).abs() < 1e-12);
                assert!((co2 - 0.18 * 658.0).abs() < 1e-9);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let running = agg.running_totals().unwrap();
        assert_eq!(running.usage.get("youtube.com"), Some(&3600));
    }

    #[test]
    fn test_totals_are_additive() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Karnataka").unwrap();
        let agg = aggregator(store.clone(), RegionPolicy::Strict);
        let today = date("2024-06-01");

        let calls = [
            ("youtube.com", 10),
            ("github.com", 25),
            ("youtube.com", 5),
            ("example.org", 1),
            ("github.com", 120),
        ];
        let mut sum_gb = 0.0;
        let mut sum_co2 = 0.0;
        for (domain, secs) in calls {
            if let RecordOutcome::Recorded { gb, co2, .. } = agg.record_interval(domain, secs, today).unwrap() {
                sum_gb += gb;
                sum_co2 += co2;
            } else {
                panic!("interval for {} was skipped", domain);
            }
        }

        let ledger = history(&store);
        assert_eq!(ledger.len(), 1);
        let day = &ledger[0];
        assert_eq!(day.totals.seconds, 161);
        assert!((day.totals.gb - sum_gb).abs() < 1e-9);
        assert!((day.totals.co2 - sum_co2).abs() < 1e-9);
        assert_eq!(day.domains["youtube.com"].seconds, 15);
        assert_eq!(day.domains["github.com"].seconds, 145);

        // Totals match the per-domain breakdown
        let by_domain: f64 = day.domains.values().map(|u| u.co2).sum();
        assert!((by_domain - day.totals.co2).abs() < 1e-9);

        let running = agg.running_totals().unwrap();
        assert_eq!(running.usage.values().sum::<u64>(), 161);
    }

    #[test]
    fn test_missing_region_touches_nothing() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        let agg = aggregator(store.clone(), RegionPolicy::Strict);

        let outcome = agg.record_interval("youtube.com", 60, date("2024-06-01")).unwrap();
        assert_eq!(outcome, RecordOutcome::skipped(SkipReason::MissingRegion));
        assert!(store.keys().unwrap().is_empty());

        store.put(keys::USER_STATE, "Atlantis").unwrap();
        let outcome = agg.record_interval("youtube.com", 60, date("2024-06-01")).unwrap();
        assert_eq!(outcome, RecordOutcome::skipped(SkipReason::MissingRegion));
        assert_eq!(store.keys().unwrap(), vec![keys::USER_STATE.to_string()]);
    }

    #[test]
    fn test_lenient_policy_records_without_region() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        let agg = aggregator(store.clone(), RegionPolicy::Lenient);

        let outcome = agg.record_interval("youtube.com", 60, date("2024-06-01")).unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded { .. }));
        assert_eq!(history(&store)[0].totals.seconds, 60);
    }

    #[test]
    fn test_invalid_input_is_skipped() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Goa").unwrap();
        let agg = aggregator(store.clone(), RegionPolicy::Strict);
        let today = date("2024-06-01");

        assert_eq!(
            agg.record_interval("", 60, today).unwrap(),
            RecordOutcome::skipped(SkipReason::EmptyDomain)
        );
        assert_eq!(
            agg.record_interval("youtube.com", 0, today).unwrap(),
            RecordOutcome::skipped(SkipReason::NonPositiveSeconds)
        );
        assert_eq!(
            agg.record_interval("youtube.com", -5, today).unwrap(),
            RecordOutcome::skipped(SkipReason::NonPositiveSeconds)
        );
        assert!(history(&store).is_empty());
    }

    #[test]
    fn test_oversized_interval_is_skipped_and_store_stays_usable() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Goa").unwrap();
        let agg = aggregator(store.clone(), RegionPolicy::Strict);
        let today = date("2024-06-01");

        for _ in 0..3 {
            assert_eq!(
                agg.record_interval("a.com", i64::MAX, today).unwrap(),
                RecordOutcome::skipped(SkipReason::ImplausibleSeconds)
            );
        }
        assert_eq!(
            agg.record_interval("a.com", MAX_INTERVAL_SECONDS + 1, today).unwrap(),
            RecordOutcome::skipped(SkipReason::ImplausibleSeconds)
        );
        assert!(matches!(
            agg.record_interval("a.com", MAX_INTERVAL_SECONDS, today).unwrap(),
            RecordOutcome::Recorded { .. }
        ));
        assert!(matches!(
            agg.record_interval("a.com", 1, today).unwrap(),
            RecordOutcome::Recorded { .. }
        ));
        assert_eq!(history(&store)[0].totals.seconds, 86_401);
    }

    #[test]
    fn test_new_date_starts_new_record() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Goa").unwrap();
        let agg = aggregator(store.clone(), RegionPolicy::Strict);

        agg.record_interval("youtube.com", 100, date("2024-06-01")).unwrap();
        agg.record_interval("youtube.com", 40, date("2024-06-02")).unwrap();

        let ledger = history(&store);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].totals.seconds, 100);
        assert_eq!(ledger[1].totals.seconds, 40);

        // Running totals only cover the new day
        let running = agg.running_totals().unwrap();
        assert_eq!(running.usage.get("youtube.com"), Some(&40));
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let (_tmp, store) = temp_store();
        let store = Arc::new(store);
        store.put(keys::USER_STATE, "Punjab").unwrap();
        let agg = Arc::new(aggregator(store.clone(), RegionPolicy::Strict));
        let today = date("2024-06-01");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        agg.record_interval("twitch.tv", 2, today).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(history(&store)[0].totals.seconds, 200);
        assert_eq!(agg.running_totals().unwrap().usage["twitch.tv"], 200);
    }
}
