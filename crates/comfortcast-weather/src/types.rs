use chrono::{DateTime, Utc};
use comfortcast_cache::CacheStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weather condition, using the provider's `weather[].main` vocabulary.
///
/// Words outside the known set are kept verbatim in [`WeatherCondition::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Snow,
    Mist,
    Fog,
    Haze,
    Other(String),
}

impl WeatherCondition {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Rain => "Rain",
            Self::Drizzle => "Drizzle",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Fog => "Fog",
            Self::Haze => "Haze",
            Self::Other(word) => word,
        }
    }

    /// Lowercase description used for synthesized snapshots, e.g. "clouds".
    pub fn description(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Provider icon code for synthesized snapshots.
    pub fn icon_code(&self) -> &'static str {
        match self {
            Self::Clear => "01d",
            _ => "03d",
        }
    }

    /// Typical cloud cover (%) for synthesized snapshots.
    pub fn cloudiness(&self) -> u32 {
        match self {
            Self::Clear => 0,
            Self::Clouds => 40,
            _ => 60,
        }
    }
}

impl From<&str> for WeatherCondition {
    fn from(word: &str) -> Self {
        match word.trim().to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            "rain" => Self::Rain,
            "drizzle" => Self::Drizzle,
            "thunderstorm" => Self::Thunderstorm,
            "snow" => Self::Snow,
            "mist" => Self::Mist,
            "fog" => Self::Fog,
            "haze" => Self::Haze,
            _ => Self::Other(word.trim().to_string()),
        }
    }
}

impl From<String> for WeatherCondition {
    fn from(word: String) -> Self {
        Self::from(word.as_str())
    }
}

impl From<WeatherCondition> for String {
    fn from(condition: WeatherCondition) -> Self {
        condition.as_str().to_string()
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supported city with the nominal values used for mock and fallback data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDescriptor {
    pub id: String,
    pub name: String,
    pub nominal_temp: f64,
    pub nominal_condition: WeatherCondition,
}

impl CityDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        nominal_temp: f64,
        nominal_condition: impl Into<WeatherCondition>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nominal_temp,
            nominal_condition: nominal_condition.into(),
        }
    }
}

/// Normalized current conditions for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_id: String,
    pub city_name: String,
    pub country: Option<String>,
    /// °C
    pub temperature: f64,
    pub feels_like: Option<f64>,
    /// %
    pub humidity: f64,
    /// hPa
    pub pressure: Option<f64>,
    /// m/s
    pub wind_speed: f64,
    /// %
    pub cloudiness: Option<u32>,
    /// m
    pub visibility: Option<u32>,
    #[serde(rename = "weather_description")]
    pub description: Option<String>,
    #[serde(rename = "weather_icon")]
    pub icon_url: Option<String>,
}

/// Comfort bands, from least to most comfortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComfortLevel {
    #[serde(rename = "Very Uncomfortable")]
    VeryUncomfortable,
    #[serde(rename = "Uncomfortable")]
    Uncomfortable,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Comfortable")]
    Comfortable,
    #[serde(rename = "Very Comfortable")]
    VeryComfortable,
}

impl ComfortLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::VeryComfortable
        } else if score >= 60.0 {
            Self::Comfortable
        } else if score >= 40.0 {
            Self::Moderate
        } else if score >= 20.0 {
            Self::Uncomfortable
        } else {
            Self::VeryUncomfortable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryUncomfortable => "Very Uncomfortable",
            Self::Uncomfortable => "Uncomfortable",
            Self::Moderate => "Moderate",
            Self::Comfortable => "Comfortable",
            Self::VeryComfortable => "Very Comfortable",
        }
    }
}

impl fmt::Display for ComfortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite comfort score and the factor scores it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComfortBreakdown {
    /// 0-100, one decimal
    pub comfort_score: f64,
    pub comfort_level: ComfortLevel,
    pub temperature_impact: f64,
    pub humidity_impact: f64,
    pub wind_impact: f64,
}

/// Where the data in a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Live provider response.
    Live,
    /// Mock backend, by configuration.
    Mock,
    /// Mock data served because the live provider failed.
    MockFallback,
    /// Catalog nominal values; no fetch succeeded.
    Nominal,
}

/// One city's weather as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(flatten)]
    pub snapshot: WeatherSnapshot,
    #[serde(flatten)]
    pub comfort: ComfortBreakdown,
    pub cache_status: CacheStatus,
    pub data_source: DataSource,
    /// When the snapshot was produced.
    pub timestamp: DateTime<Utc>,
}

impl WeatherReport {
    pub fn with_status(mut self, status: CacheStatus) -> Self {
        self.cache_status = status;
        self
    }

    pub fn city_id(&self) -> &str {
        &self.snapshot.city_id
    }

    pub fn score(&self) -> f64 {
        self.comfort.comfort_score
    }
}

/// A report with its position in the comfort ranking (1 = most comfortable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedWeather {
    pub rank: usize,
    #[serde(flatten)]
    pub report: WeatherReport,
}

/// Service-level facts for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub service: String,
    pub version: String,
    pub using_mock_data: bool,
    pub cache_enabled: bool,
    pub cache_duration_seconds: u64,
    pub total_supported_cities: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_parses_provider_vocabulary() {
        assert_eq!(WeatherCondition::from("Clouds"), WeatherCondition::Clouds);
        assert_eq!(WeatherCondition::from("clear"), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from(" Mist "), WeatherCondition::Mist);
    }

    #[test]
    fn test_unknown_condition_kept_verbatim() {
        let condition = WeatherCondition::from("Smoke");
        assert_eq!(condition, WeatherCondition::Other("Smoke".to_string()));
        assert_eq!(condition.as_str(), "Smoke");
        assert_eq!(condition.description(), "smoke");
    }

    #[test]
    fn test_condition_serde_as_plain_string() {
        let json = serde_json::to_string(&WeatherCondition::Thunderstorm).unwrap();
        assert_eq!(json, "\"Thunderstorm\"");
        let back: WeatherCondition = serde_json::from_str("\"Tornado\"").unwrap();
        assert_eq!(back, WeatherCondition::Other("Tornado".to_string()));
    }

    #[test]
    fn test_condition_mock_attributes() {
        assert_eq!(WeatherCondition::Clear.cloudiness(), 0);
        assert_eq!(WeatherCondition::Clouds.cloudiness(), 40);
        assert_eq!(WeatherCondition::Rain.cloudiness(), 60);
        assert_eq!(WeatherCondition::Clear.icon_code(), "01d");
        assert_eq!(WeatherCondition::Mist.icon_code(), "03d");
    }

    #[test]
    fn test_comfort_level_boundaries() {
        assert_eq!(ComfortLevel::from_score(100.0), ComfortLevel::VeryComfortable);
        assert_eq!(ComfortLevel::from_score(80.0), ComfortLevel::VeryComfortable);
        assert_eq!(ComfortLevel::from_score(79.9), ComfortLevel::Comfortable);
        assert_eq!(ComfortLevel::from_score(60.0), ComfortLevel::Comfortable);
        assert_eq!(ComfortLevel::from_score(40.0), ComfortLevel::Moderate);
        assert_eq!(ComfortLevel::from_score(20.0), ComfortLevel::Uncomfortable);
        assert_eq!(ComfortLevel::from_score(19.9), ComfortLevel::VeryUncomfortable);
        assert_eq!(ComfortLevel::from_score(0.0), ComfortLevel::VeryUncomfortable);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = WeatherReport {
            snapshot: WeatherSnapshot {
                city_id: "2988507".into(),
                city_name: "Paris".into(),
                country: Some("FR".into()),
                temperature: 22.4,
                feels_like: None,
                humidity: 50.0,
                pressure: Some(1013.0),
                wind_speed: 1.0,
                cloudiness: Some(0),
                visibility: None,
                description: Some("clear".into()),
                icon_url: None,
            },
            comfort: ComfortBreakdown {
                comfort_score: 100.0,
                comfort_level: ComfortLevel::VeryComfortable,
                temperature_impact: 100.0,
                humidity_impact: 100.0,
                wind_impact: 100.0,
            },
            cache_status: CacheStatus::Miss,
            data_source: DataSource::Live,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(RankedWeather { rank: 1, report }).unwrap();
        assert_eq!(json["rank"], 1);
        assert_eq!(json["city_name"], "Paris");
        assert_eq!(json["comfort_level"], "Very Comfortable");
        assert_eq!(json["cache_status"], "MISS");
        assert_eq!(json["data_source"], "live");
        assert_eq!(json["weather_description"], "clear");
    }
}
