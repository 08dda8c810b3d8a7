//! Emission calculator: active time -> data volume -> electricity -> CO2.

use super::bandwidth::BandwidthEstimator;
use super::region::{Region, NATIONAL_DEFAULT_FACTOR};

use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// Electricity spent per GB transferred, in kWh.
pub const ELECTRICITY_PER_GB_KWH: f64 = 0.12;

/// What to do when the configured region is missing or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionPolicy {
    /// Produce no estimate; the caller must not record anything.
    #[default]
    Strict,
    /// Use the national default factor.
    Lenient,
}

impl FromStr for RegionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RegionPolicy::Strict),
            "lenient" => Ok(RegionPolicy::Lenient),
            other => Err(format!("unknown region policy: {}", other)),
        }
    }
}

/// Result of converting one span of activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEstimate {
    pub gb_per_hour: f64,
    pub gb: f64,
    pub kwh: f64,
    pub co2: f64,
}

/// Grams CO2 for `gb` transferred on a grid emitting `factor` g/kWh.
pub fn grams_co2(gb: f64, factor: f64) -> f64 {
    gb * ELECTRICITY_PER_GB_KWH * factor
}

/// Grams CO2 per km for a small petrol car.
const CAR_G_PER_KM: f64 = 120.0;
/// Grams CO2 per full smartphone charge.
const PHONE_CHARGE_G: f64 = 5.0;

/// Everyday comparisons for an amount of CO2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Equivalents {
    pub km_driven: f64,
    pub phone_charges: u64,
}

impl Equivalents {
    pub fn from_grams(grams: f64) -> Self {
        let grams = grams.max(0.0);
        Self {
            km_driven: grams / CAR_G_PER_KM,
            phone_charges: (grams / PHONE_CHARGE_G).floor() as u64,
        }
    }
}

pub struct EmissionCalculator {
    bandwidth: Arc<BandwidthEstimator>,
    policy: RegionPolicy,
}

impl EmissionCalculator {
    pub fn new(bandwidth: Arc<BandwidthEstimator>, policy: RegionPolicy) -> Self {
        Self { bandwidth, policy }
    }

    pub fn policy(&self) -> RegionPolicy {
        self.policy
    }

    /// Emission factor for a stored region name, honoring the policy.
    pub fn emission_factor(&self, region: Option<&str>) -> Option<f64> {
        match region.map(str::parse::<Region>) {
            Some(Ok(r)) => Some(r.emission_factor()),
            _ => match self.policy {
                RegionPolicy::Strict => None,
                RegionPolicy::Lenient => Some(NATIONAL_DEFAULT_FACTOR),
            },
        }
    }

    /// Full conversion chain for `seconds` of activity on `domain`.
    pub fn estimate_usage(&self, domain: &str, seconds: u64, region: Option<&str>) -> Option<UsageEstimate> {
        let factor = self.emission_factor(region)?;
        Some(self.usage_at_factor(domain, seconds, factor))
    }

    /// Conversion chain on a grid emitting `factor` g/kWh.
    pub fn usage_at_factor(&self, domain: &str, seconds: u64, factor: f64) -> UsageEstimate {
        let gb_per_hour = self.bandwidth.gb_per_hour(domain);
        let gb = gb_per_hour * (seconds as f64 / 3600.0);

        UsageEstimate {
            gb_per_hour,
            gb,
            kwh: gb * ELECTRICITY_PER_GB_KWH,
            co2: grams_co2(gb, factor),
        }
    }

    /// Grams CO2 for `seconds` on `domain`, or `None` when the region policy
    /// suppresses the computation.
    pub fn estimate(&self, domain: &str, seconds: u64, region: Option<&str>) -> Option<f64> {
        self.estimate_usage(domain, seconds, region).map(|u| u.co2)
    }
}
