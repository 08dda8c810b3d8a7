//! Bandwidth estimation per domain.
//!
//! Resolution order: a dynamic rate observed from live playback signals, then
//! the static per-domain table, then a category default chosen by provider
//! name.

use crate::db::{DomainBandwidthRate, RateSource};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Default GB/hour for streaming providers; the live-signal heuristics scale
/// from this.
pub const STREAMING_DEFAULT_GB: f64 = 1.5;

/// Known per-domain rates in GB/hour.
const STATIC_RATES: &[(&str, f64)] = &[
    ("youtube.com", 1.5),
    ("netflix.com", 3.0),
    ("zoom.us", 1.0),
    ("meet.google.com", 1.0),
    ("whatsapp.com", 0.02),
    ("instagram.com", 0.5),
    ("facebook.com", 0.4),
    ("docs.google.com", 0.05),
    ("quora.com", 0.05),
    ("linkedin.com", 0.1),
    ("github.com", 0.05),
];

/// Video height in pixels to GB/hour, sorted by descending threshold.
const RESOLUTION_TIERS: [(u32, f64); 8] = [
    (2160, 7.0),
    (1440, 4.5),
    (1080, 3.0),
    (720, 1.5),
    (480, 0.7),
    (360, 0.25),
    (240, 0.15),
    (144, 0.1),
];

/// Coarse traffic category, inferred from the domain name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Streaming,
    Social,
    Messaging,
    Docs,
    Code,
    Default,
}

impl Category {
    pub fn classify(domain: &str) -> Self {
        let d = domain.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| d.contains(n));

        if has(&["youtube", "netflix", "primevideo", "twitch", "hotstar"]) {
            Category::Streaming
        } else if has(&["instagram", "facebook", "twitter", "tiktok"]) {
            Category::Social
        } else if has(&["whatsapp", "telegram", "messenger"]) {
            Category::Messaging
        } else if has(&["docs.google", "office", "slack"]) {
            Category::Docs
        } else if has(&["github", "gitlab"]) {
            Category::Code
        } else {
            Category::Default
        }
    }

    pub fn default_rate(self) -> f64 {
        match self {
            Category::Streaming => STREAMING_DEFAULT_GB,
            Category::Social => 0.5,
            Category::Messaging => 0.02,
            Category::Docs => 0.05,
            Category::Code => 0.05,
            Category::Default => 0.2,
        }
    }
}

/// Live playback signals reported by a page-level media observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSignals {
    /// Video height in pixels.
    #[serde(default)]
    pub resolution: Option<u32>,
    /// Link downlink speed in Mbps.
    #[serde(default)]
    pub downlink: Option<f64>,
    /// Average HTTP response size in MB.
    #[serde(default, rename = "avgRequestSizeMB", alias = "avgReqMB")]
    pub avg_request_size_mb: Option<f64>,
}

/// Map a video height to its tier: the largest threshold not above `height`.
/// Heights below the lowest tier get the lowest tier's rate.
pub fn rate_for_resolution(height: u32) -> f64 {
    RESOLUTION_TIERS
        .iter()
        .find(|(threshold, _)| height >= *threshold)
        .or_else(|| RESOLUTION_TIERS.last())
        .map(|(_, gb)| *gb)
        .unwrap_or(STREAMING_DEFAULT_GB)
}

/// Derive a GB/hour rate from live signals, or `None` when no signal is
/// decisive. Zero or missing values count as absent.
pub fn rate_from_signals(signals: &LiveSignals) -> Option<f64> {
    if let Some(height) = signals.resolution.filter(|h| *h > 0) {
        return Some(rate_for_resolution(height));
    }

    if let Some(mbps) = signals.downlink.filter(|v| *v > 0.0) {
        let factor = if mbps >= 20.0 {
            2.0
        } else if mbps >= 5.0 {
            1.0
        } else {
            0.6
        };
        return Some(STREAMING_DEFAULT_GB * factor);
    }

    if let Some(mb) = signals.avg_request_size_mb.filter(|v| *v > 0.0) {
        if mb >= 2.0 {
            return Some(STREAMING_DEFAULT_GB * 2.0);
        }
        if mb >= 0.5 {
            return Some(STREAMING_DEFAULT_GB);
        }
    }

    None
}

/// Look up a domain in the static table. Subdomains of a listed domain
/// (`m.youtube.com`) share its rate.
pub fn static_rate(domain: &str) -> Option<f64> {
    STATIC_RATES
        .iter()
        .find(|(key, _)| {
            domain == *key
                || domain
                    .strip_suffix(key)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
        .map(|(_, gb)| *gb)
}

/// Per-process bandwidth estimator.
///
/// Dynamic rates live for the lifetime of the process and never expire.
#[derive(Default)]
pub struct BandwidthEstimator {
    dynamic: RwLock<HashMap<String, DomainBandwidthRate>>,
}

impl BandwidthEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate the rate for `domain`. When `signals` are given the result is
    /// a dynamic rate computed from them (not cached); signals that decide
    /// nothing yield the domain's category default.
    pub fn estimate_rate(&self, domain: &str, signals: Option<&LiveSignals>) -> DomainBandwidthRate {
        let Some(signals) = signals else {
            return self.lookup(domain);
        };
        let gb_per_hour =
            rate_from_signals(signals).unwrap_or_else(|| Category::classify(domain).default_rate());
        DomainBandwidthRate {
            domain: domain.to_string(),
            gb_per_hour,
            source: RateSource::Dynamic,
            observed_at: Utc::now(),
        }
    }

    /// Resolve the rate for `domain` without live signals.
    pub fn lookup(&self, domain: &str) -> DomainBandwidthRate {
        if let Some(rate) = self.read_dynamic().get(domain) {
            return rate.clone();
        }

        let (gb_per_hour, source) = match static_rate(domain) {
            Some(gb) => (gb, RateSource::Static),
            None => (Category::classify(domain).default_rate(), RateSource::CategoryDefault),
        };

        DomainBandwidthRate {
            domain: domain.to_string(),
            gb_per_hour,
            source,
            observed_at: Utc::now(),
        }
    }

    pub fn gb_per_hour(&self, domain: &str) -> f64 {
        self.lookup(domain).gb_per_hour
    }

    /// Feed live signals for `domain` and cache the resulting dynamic rate,
    /// which replaces any earlier one. Returns the rate now in effect.
    pub fn observe(&self, domain: &str, signals: &LiveSignals) -> DomainBandwidthRate {
        let rate = self.estimate_rate(domain, Some(signals));
        tracing::debug!(
            "BandwidthEstimator: dynamic rate for {} = {:.2} GB/h",
            domain,
            rate.gb_per_hour
        );
        self.dynamic
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(domain.to_string(), rate.clone());
        rate
    }

    /// Snapshot of all dynamic rates, keyed by domain.
    pub fn dynamic_rates(&self) -> HashMap<String, DomainBandwidthRate> {
        self.read_dynamic().clone()
    }

    fn read_dynamic(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, DomainBandwidthRate>> {
        self.dynamic.read().unwrap_or_else(|e| e.into_inner())
    }
}
