use serde::{Deserialize, Serialize};

/// A news headline candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub summary: String,
    pub source: String,
    /// Stable dedup key derived from the headline
    pub hash: String,
}

/// Current conditions for one city, imperial units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub state: String,
    pub temp_f: i64,
    pub feels_like_f: i64,
    pub condition: String,
    pub wind_mph: i64,
    pub humidity: i64,
    pub daily_high_f: i64,
    pub daily_low_f: i64,
}

impl WeatherReport {
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}
