//! Store keys shared with the dashboard.

pub const USAGE: &str = "usage";
pub const CO2: &str = "co2";
pub const DAILY_HISTORY: &str = "dailyHistory";
pub const LAST_OPENED_DATE: &str = "lastOpenedDate";
pub const STREAK_DATA: &str = "streakData";
pub const ECO_POINTS_DATA: &str = "ecoPointsData";
pub const LAST_GAMIFICATION_PROCESSED_DATE: &str = "lastGamificationProcessedDate";
pub const DYNAMIC_RATES: &str = "dynamicRates";
pub const USER_STATE: &str = "userState";
pub const GAMIFICATION_ENABLED: &str = "gamificationEnabled";
