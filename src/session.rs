//! Activity session: turns focus changes into active intervals.
//!
//! Only whole seconds are emitted. The fractional remainder of each span is
//! carried into the next tracked span, even across a domain switch, so no
//! wall-clock second is reported twice or dropped.

use crate::estimate::normalize_domain;
use crate::tracker::ActiveInterval;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Default)]
pub struct ActivitySession {
    domain: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl ActivitySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Focus moved to `target` (a domain or URL; `None` for a page that is
    /// not tracked). Closes the open span; the new one starts where the
    /// emitted whole seconds ended.
    pub fn focus(&mut self, target: Option<&str>, now: DateTime<Utc>) -> Option<ActiveInterval> {
        let closed = self.take_whole_seconds(now);
        // Time on an untracked page is not credited to the next domain.
        let carried = if self.domain.is_some() { self.started_at } else { None };
        self.domain = target.and_then(normalize_domain);
        self.started_at = Some(carried.unwrap_or(now));
        closed
    }

    /// Periodic poll of the focused page. Emits the elapsed whole seconds
    /// for the current domain and keeps the span open; a different domain is
    /// treated as a focus change.
    pub fn tick(&mut self, target: Option<&str>, now: DateTime<Utc>) -> Option<ActiveInterval> {
        let domain = target.and_then(normalize_domain);
        if domain != self.domain {
            return self.focus(target, now);
        }
        self.take_whole_seconds(now)
    }

    /// The host is going away; flush and forget the open span.
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Option<ActiveInterval> {
        let closed = self.take_whole_seconds(now);
        self.domain = None;
        self.started_at = None;
        closed
    }

    fn take_whole_seconds(&mut self, now: DateTime<Utc>) -> Option<ActiveInterval> {
        let domain = self.domain.clone()?;
        let started = self.started_at?;
        let seconds = (now - started).num_seconds();
        if seconds <= 0 {
            return None;
        }
        self.started_at = Some(started + Duration::seconds(seconds));
        Some(ActiveInterval { domain, seconds })
    }
}
