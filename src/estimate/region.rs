//! Regional grid emission factors.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Grams CO2 per kWh used when no valid region is configured and the lenient
/// policy is active.
pub const NATIONAL_DEFAULT_FACTOR: f64 = 716.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown region: {0}")]
pub struct ParseRegionError(pub String);

/// An administrative region with a known grid emission factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    AndhraPradesh,
    ArunachalPradesh,
    Assam,
    Bihar,
    Chhattisgarh,
    Goa,
    Gujarat,
    Haryana,
    HimachalPradesh,
    Jharkhand,
    Karnataka,
    Kerala,
    MadhyaPradesh,
    Maharashtra,
    Manipur,
    Meghalaya,
    Mizoram,
    Nagaland,
    Odisha,
    Punjab,
    Rajasthan,
    Sikkim,
    TamilNadu,
    Telangana,
    Tripura,
    UttarPradesh,
    Uttarakhand,
    WestBengal,
}

impl Region {
    pub const ALL: [Region; 28] = [
        Region::AndhraPradesh,
        Region::ArunachalPradesh,
        Region::Assam,
        Region::Bihar,
        Region::Chhattisgarh,
        Region::Goa,
        Region::Gujarat,
        Region::Haryana,
        Region::HimachalPradesh,
        Region::Jharkhand,
        Region::Karnataka,
        Region::Kerala,
        Region::MadhyaPradesh,
        Region::Maharashtra,
        Region::Manipur,
        Region::Meghalaya,
        Region::Mizoram,
        Region::Nagaland,
        Region::Odisha,
        Region::Punjab,
        Region::Rajasthan,
        Region::Sikkim,
        Region::TamilNadu,
        Region::Telangana,
        Region::Tripura,
        Region::UttarPradesh,
        Region::Uttarakhand,
        Region::WestBengal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::AndhraPradesh => "Andhra Pradesh",
            Region::ArunachalPradesh => "Arunachal Pradesh",
            Region::Assam => "Assam",
            Region::Bihar => "Bihar",
            Region::Chhattisgarh => "Chhattisgarh",
            Region::Goa => "Goa",
            Region::Gujarat => "Gujarat",
            Region::Haryana => "Haryana",
            Region::HimachalPradesh => "Himachal Pradesh",
            Region::Jharkhand => "Jharkhand",
            Region::Karnataka => "Karnataka",
            Region::Kerala => "Kerala",
            Region::MadhyaPradesh => "Madhya Pradesh",
            Region::Maharashtra => "Maharashtra",
            Region::Manipur => "Manipur",
            Region::Meghalaya => "Meghalaya",
            Region::Mizoram => "Mizoram",
            Region::Nagaland => "Nagaland",
            Region::Odisha => "Odisha",
            Region::Punjab => "Punjab",
            Region::Rajasthan => "Rajasthan",
            Region::Sikkim => "Sikkim",
            Region::TamilNadu => "Tamil Nadu",
            Region::Telangana => "Telangana",
            Region::Tripura => "Tripura",
            Region::UttarPradesh => "Uttar Pradesh",
            Region::Uttarakhand => "Uttarakhand",
            Region::WestBengal => "West Bengal",
        }
    }

    /// Grid emission factor in grams CO2 per kWh.
    pub fn emission_factor(self) -> f64 {
        match self {
            Region::AndhraPradesh => 654.0,
            Region::ArunachalPradesh => 24.0,
            Region::Assam => 586.0,
            Region::Bihar => 815.0,
            Region::Chhattisgarh => 806.0,
            Region::Goa => 46.0,
            Region::Gujarat => 492.0,
            Region::Haryana => 769.0,
            Region::HimachalPradesh => 24.0,
            Region::Jharkhand => 814.0,
            Region::Karnataka => 394.0,
            Region::Kerala => 28.0,
            Region::MadhyaPradesh => 729.0,
            Region::Maharashtra => 658.0,
            Region::Manipur => 24.0,
            Region::Meghalaya => 24.0,
            Region::Mizoram => 25.0,
            Region::Nagaland => 24.0,
            Region::Odisha => 739.0,
            Region::Punjab => 685.0,
            Region::Rajasthan => 437.0,
            Region::Sikkim => 24.0,
            Region::TamilNadu => 493.0,
            Region::Telangana => 679.0,
            Region::Tripura => 489.0,
            Region::UttarPradesh => 764.0,
            Region::Uttarakhand => 57.0,
            Region::WestBengal => 782.0,
        }
    }
}

// Names compare case-insensitively with all whitespace removed, so
// "tamil nadu" and "TamilNadu" both resolve.
fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold(s);
        Region::ALL
            .iter()
            .copied()
            .find(|r| fold(r.name()) == wanted)
            .ok_or_else(|| ParseRegionError(s.to_string()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        assert_eq!("Maharashtra".parse::<Region>().unwrap(), Region::Maharashtra);
        assert_eq!("tamil nadu".parse::<Region>().unwrap(), Region::TamilNadu);
        assert_eq!("Ass am".parse::<Region>().unwrap(), Region::Assam);
        assert!("India".parse::<Region>().is_err());
        assert!("".parse::<Region>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for region in Region::ALL {
            assert_eq!(region.name().parse::<Region>().unwrap(), region);
            assert!(region.emission_factor() > 0.0);
        }
    }

    #[test]
    fn test_serde_uses_display_name() {
        let json = serde_json::to_string(&Region::WestBengal).unwrap();
        assert_eq!(json, "\"West Bengal\"");
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Region::WestBengal);
        assert!(serde_json::from_str::<Region>("\"Atlantis\"").is_err());
    }
}
