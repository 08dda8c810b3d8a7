//! Command dispatcher.
//!
//! Every request from the observer, the media observer or the dashboard is a
//! [`Command`]. One dispatcher owns the activity session and handles commands
//! strictly one at a time.

use crate::db::{DayRecord, DbError, RunningTotals};
use crate::estimate::{Equivalents, LiveSignals};
use crate::session::ActivitySession;
use crate::tracker::{ActiveInterval, RecordOutcome, Tracker};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// A finished active interval from an external observer.
    RecordInterval { domain: String, seconds: i64 },
    /// Live playback statistics from a streaming page.
    #[serde(alias = "VIDEO_STATS")]
    VideoStats {
        domain: String,
        #[serde(flatten)]
        signals: LiveSignals,
    },
    /// Focus moved to a page; `domain` may be a URL or absent.
    Focus {
        #[serde(default, alias = "url")]
        domain: Option<String>,
    },
    /// Periodic poll of the focused page.
    Tick {
        #[serde(default, alias = "url")]
        domain: Option<String>,
    },
    Suspend,
    GetToday,
    GetHistory,
    GetRewardState,
    GetStreakState,
    Predict {
        #[serde(rename = "daysAhead")]
        days_ahead: i64,
    },
    UpdateGamification,
    RebuildGamification,
    ToggleGamification,
    GetRegion,
    SetRegion { region: String },
    RunMaintenance,
}

/// Uniform reply: `{ok, value}` or `{ok: false, errorMessage}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Reply {
    pub fn ok<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self {
                ok: true,
                value: Some(value),
                error_message: None,
            },
            Err(e) => Self::error(format!("failed to encode reply: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error_message: Some(message.into()),
        }
    }

    fn from_store<T: Serialize>(result: Result<T, DbError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => {
                tracing::error!("Dispatcher: store error: {}", e);
                Self::error(format!("store unavailable: {}", e))
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TodayView {
    record: DayRecord,
    running: RunningTotals,
    equivalents: Equivalents,
}

pub struct Dispatcher {
    tracker: Arc<Tracker>,
    session: ActivitySession,
}

impl Dispatcher {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self {
            tracker,
            session: ActivitySession::new(),
        }
    }

    /// Handle one command at local time `now`.
    pub fn dispatch(&mut self, command: Command, now: DateTime<Local>) -> Reply {
        let today = now.date_naive();
        let utc = now.with_timezone(&Utc);

        match command {
            Command::RecordInterval { domain, seconds } => {
                self.record(Some(ActiveInterval { domain, seconds }), today)
            }
            Command::VideoStats { domain, signals } => {
                match self.tracker.report_live_signal(&domain, &signals) {
                    Some(rate) => Reply::ok(rate),
                    None => Reply::error(format!("invalid domain: {:?}", domain)),
                }
            }
            Command::Focus { domain } => {
                let closed = self.session.focus(domain.as_deref(), utc);
                tracing::debug!("Dispatcher: focus on {:?}", self.session.current_domain());
                self.record(closed, today)
            }
            Command::Tick { domain } => {
                let closed = self.session.tick(domain.as_deref(), utc);
                self.record(closed, today)
            }
            Command::Suspend => {
                let closed = self.session.suspend(utc);
                self.record(closed, today)
            }
            Command::GetToday => Reply::from_store(self.today_view(today)),
            Command::GetHistory => Reply::from_store(self.tracker.get_history()),
            Command::GetRewardState => Reply::from_store(self.tracker.get_reward_state()),
            Command::GetStreakState => Reply::from_store(self.tracker.get_streak_state()),
            Command::Predict { days_ahead } => match self.tracker.predictor().predict(days_ahead, today) {
                Ok(grams) => Reply::ok(grams),
                Err(e) => Reply::error(e.to_string()),
            },
            Command::UpdateGamification => Reply::from_store(self.tracker.rewards().advance_one_day(today)),
            Command::RebuildGamification => {
                Reply::from_store(self.tracker.rewards().rebuild_from_history(today))
            }
            Command::ToggleGamification => Reply::from_store(self.tracker.toggle_gamification()),
            Command::GetRegion => Reply::from_store(self.tracker.get_region()),
            Command::SetRegion { region } => match self.tracker.set_region(&region) {
                Ok(region) => Reply::ok(region),
                Err(e) => Reply::error(e.to_string()),
            },
            Command::RunMaintenance => Reply::from_store(self.tracker.run_maintenance(today)),
        }
    }

    fn record(&self, interval: Option<ActiveInterval>, today: NaiveDate) -> Reply {
        let Some(interval) = interval else {
            return Reply::ok(Value::Null);
        };

        let result = self
            .tracker
            .aggregator()
            .record_interval(&interval.domain, interval.seconds, today);
        if let Ok(RecordOutcome::Skipped { reason }) = &result {
            tracing::warn!(
                "Dispatcher: dropped {}s on {:?} ({:?})",
                interval.seconds,
                interval.domain,
                reason
            );
        }
        Reply::from_store(result)
    }

    fn today_view(&self, today: NaiveDate) -> Result<TodayView, DbError> {
        let record = self.tracker.get_today(today)?;
        let equivalents = Equivalents::from_grams(record.totals.co2);
        Ok(TodayView {
            record,
            running: self.tracker.aggregator().running_totals()?,
            equivalents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::temp_store;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon(day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 8, day, 12, 0, 0).unwrap()
    }

    fn dispatcher(store: crate::db::Store) -> Dispatcher {
        let tracker = Tracker::new(Arc::new(store), &ServerConfig::default());
        Dispatcher::new(Arc::new(tracker))
    }

    fn parse(value: Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(json!({"type": "recordInterval", "domain": "youtube.com", "seconds": 30})),
            Command::RecordInterval {
                domain: "youtube.com".to_string(),
                seconds: 30
            }
        );
        assert_eq!(
            parse(json!({"type": "VIDEO_STATS", "domain": "youtube.com", "resolution": 1080, "avgReqMB": null})),
            Command::VideoStats {
                domain: "youtube.com".to_string(),
                signals: LiveSignals {
                    resolution: Some(1080),
                    ..Default::default()
                }
            }
        );
        assert_eq!(parse(json!({"type": "predict", "daysAhead": 3})), Command::Predict { days_ahead: 3 });
        assert_eq!(parse(json!({"type": "focus", "url": "https://x.org/"})), Command::Focus {
            domain: Some("https://x.org/".to_string())
        });
        assert_eq!(parse(json!({"type": "suspend"})), Command::Suspend);
        assert!(serde_json::from_value::<Command>(json!({"type": "explode"})).is_err());
    }

    #[test]
    fn test_record_without_region_is_dropped() {
        let (_tmp, store) = temp_store();
        let mut d = dispatcher(store);
        let reply = d.dispatch(
            Command::RecordInterval {
                domain: "youtube.com".to_string(),
                seconds: 60,
            },
            noon(1),
        );
        assert!(reply.ok);
        assert_eq!(reply.value.unwrap()["status"], "skipped");

        let today = d.dispatch(Command::GetToday, noon(1));
        assert_eq!(today.value.unwrap()["record"]["totals"]["seconds"], 0);
    }

    #[test]
    fn test_focus_flow_records_intervals() {
        let (_tmp, store) = temp_store();
        let mut d = dispatcher(store);
        assert!(d.dispatch(Command::SetRegion { region: "Goa".to_string() }, noon(1)).ok);

        let start = noon(1);
        d.dispatch(Command::Focus { domain: Some("https://www.youtube.com/watch".to_string()) }, start);
        let reply = d.dispatch(Command::Focus { domain: Some("github.com".to_string()) }, start + chrono::Duration::seconds(45));
        assert_eq!(reply.value.unwrap()["seconds"], 45);
        d.dispatch(Command::Suspend, start + chrono::Duration::seconds(60));

        let today = d.dispatch(Command::GetToday, start).value.unwrap();
        assert_eq!(today["record"]["totals"]["seconds"], 60);
        assert_eq!(today["record"]["domains"]["youtube.com"]["seconds"], 45);
        assert_eq!(today["running"]["usage"]["github.com"], 15);
    }

    #[test]
    fn test_predict_errors_are_messages() {
        let (_tmp, store) = temp_store();
        let mut d = dispatcher(store);

        let reply = d.dispatch(Command::Predict { days_ahead: 0 }, noon(1));
        assert!(!reply.ok);
        assert!(reply.error_message.unwrap().contains("between 1 and 7"));

        let reply = d.dispatch(Command::Predict { days_ahead: 8 }, noon(1));
        assert!(!reply.ok);

        let reply = d.dispatch(Command::Predict { days_ahead: 3 }, noon(1));
        assert!(!reply.ok);
        assert!(reply.error_message.unwrap().contains("not enough data"));
    }

    #[test]
    fn test_set_region_rejects_unknown() {
        let (_tmp, store) = temp_store();
        let mut d = dispatcher(store);
        let reply = d.dispatch(Command::SetRegion { region: "India".to_string() }, noon(1));
        assert!(!reply.ok);
        let reply = d.dispatch(Command::GetRegion, noon(1));
        assert_eq!(reply.value, Some(Value::Null));
    }

    #[test]
    fn test_reply_shape() {
        let ok = serde_json::to_value(Reply::ok(12.5)).unwrap();
        assert_eq!(ok, json!({"ok": true, "value": 12.5}));
        let err = serde_json::to_value(Reply::error("nope")).unwrap();
        assert_eq!(err, json!({"ok": false, "errorMessage": "nope"}));
    }
}
