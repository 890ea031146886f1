//! Provider response schema (OpenWeatherMap "current weather").
//!
//! Every field is optional; only the ones a snapshot needs are checked.

use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::types::WeatherSnapshot;

const ICON_URL_BASE: &str = "https://openweathermap.org/img/wn";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub coord: Option<Coord>,
    #[serde(default)]
    pub weather: Vec<ProviderCondition>,
    pub main: Option<MainReadings>,
    pub wind: Option<Wind>,
    pub clouds: Option<Clouds>,
    pub visibility: Option<u32>,
    pub sys: Option<Sys>,
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coord {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCondition {
    pub id: Option<i64>,
    pub main: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clouds {
    pub all: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sys {
    pub country: Option<String>,
}

/// Full URL for a provider icon code such as `01d`.
pub fn icon_url(icon: &str) -> String {
    format!("{}/{}@2x.png", ICON_URL_BASE, icon)
}

impl ProviderResponse {
    /// Normalize into a snapshot.
    ///
    /// `requested_id` and `fallback_name` fill in when the provider omits `id` / `name`.
    /// Fails only when temperature or humidity is missing.
    pub fn into_snapshot(
        self,
        requested_id: &str,
        fallback_name: Option<&str>,
    ) -> Result<WeatherSnapshot, UpstreamError> {
        let main = self.main.ok_or(UpstreamError::MissingField("main"))?;
        let temperature = main.temp.ok_or(UpstreamError::MissingField("main.temp"))?;
        let humidity = main.humidity.ok_or(UpstreamError::MissingField("main.humidity"))?;

        let condition = self.weather.into_iter().next();
        let description = condition.as_ref().and_then(|c| c.description.clone());
        let icon = condition.and_then(|c| c.icon).map(|code| icon_url(&code));

        let city_name = self
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| fallback_name.map(str::to_string))
            .unwrap_or_default();

        Ok(WeatherSnapshot {
            city_id: self
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| requested_id.to_string()),
            city_name,
            country: self.sys.and_then(|s| s.country),
            temperature,
            feels_like: main.feels_like,
            humidity,
            pressure: main.pressure,
            wind_speed: self.wind.and_then(|w| w.speed).unwrap_or(0.0),
            cloudiness: self.clouds.and_then(|c| c.all),
            visibility: self.visibility,
            description,
            icon_url: icon,
        })
    }
}
