//! Fetch, score, cache and rank.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use comfortcast_cache::{CacheCoordinator, CacheStatistics, CacheStatus, CacheStatusReport, Resettable};
use comfortcast_core::Config;

use crate::catalog::CityCatalog;
use crate::comfort;
use crate::error::{ServiceError, UpstreamError};
use crate::types::{
    CityDescriptor, ComfortBreakdown, ComfortLevel, DataSource, RankedWeather, SystemInfo,
    WeatherCondition, WeatherReport, WeatherSnapshot,
};
use crate::upstream::schema::icon_url;
use crate::upstream::UpstreamClient;

/// Prefix of the reported cache keys, e.g. `cityWeather::1248991`.
pub const CACHE_NAMESPACE: &str = "cityWeather";

pub const SERVICE_NAME: &str = "comfortcast";

/// Score forced onto fallback records.
pub const FALLBACK_SCORE: f64 = 50.0;

const MAX_CITY_ID_LEN: usize = 12;

/// Why a load produced nothing cacheable.
#[derive(Debug, Clone)]
pub enum FetchFailure {
    /// Live data failed and mock data was produced instead. Served, never cached.
    Degraded {
        report: Box<WeatherReport>,
        reason: String,
    },
    /// Neither live nor mock data could be produced.
    Unavailable { reason: String },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degraded { reason, .. } => write!(f, "served mock data after: {}", reason),
            Self::Unavailable { reason } => f.write_str(reason),
        }
    }
}

impl From<UpstreamError> for FetchFailure {
    fn from(err: UpstreamError) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
        }
    }
}

/// Check that `city_id` looks like a provider id: 1-12 ASCII digits.
pub fn validate_city_id(city_id: &str) -> Result<(), ServiceError> {
    if city_id.is_empty() || city_id.len() > MAX_CITY_ID_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "city id must be 1-{} digits, got {:?}",
            MAX_CITY_ID_LEN, city_id
        )));
    }
    if !city_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::InvalidInput(format!(
            "city id must be numeric, got {:?}",
            city_id
        )));
    }
    Ok(())
}

/// Non-authoritative record built from catalog nominal values.
pub fn fallback_report(city: &CityDescriptor) -> WeatherReport {
    let cloudiness = match city.nominal_condition {
        WeatherCondition::Clear => 0,
        _ => 40,
    };
    let snapshot = WeatherSnapshot {
        city_id: city.id.clone(),
        city_name: city.name.clone(),
        country: None,
        temperature: city.nominal_temp,
        feels_like: Some(city.nominal_temp + 2.0),
        humidity: 50.0,
        pressure: Some(1013.0),
        wind_speed: 3.0,
        cloudiness: Some(cloudiness),
        visibility: Some(10_000),
        description: Some(city.nominal_condition.to_string()),
        icon_url: Some(icon_url("03d")),
    };

    let comfort = ComfortBreakdown {
        comfort_score: FALLBACK_SCORE,
        comfort_level: ComfortLevel::Moderate,
        ..comfort::score_snapshot(&snapshot)
    };

    WeatherReport {
        snapshot,
        comfort,
        cache_status: CacheStatus::Fallback,
        data_source: DataSource::Nominal,
        timestamp: Utc::now(),
    }
}

pub struct WeatherPipeline {
    catalog: Arc<CityCatalog>,
    upstream: UpstreamClient,
    cache: CacheCoordinator<WeatherReport, FetchFailure>,
}

impl WeatherPipeline {
    /// Clearing the cache also resets `catalog`.
    pub fn new(catalog: Arc<CityCatalog>, upstream: UpstreamClient, ttl: Duration) -> Self {
        let cache: CacheCoordinator<WeatherReport, FetchFailure> =
            CacheCoordinator::new(CACHE_NAMESPACE, ttl);
        cache.register_reset_hook(catalog.clone());
        Self {
            catalog,
            upstream,
            cache,
        }
    }

    /// Wire catalog, upstream backend and cache from configuration.
    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let catalog = Arc::new(CityCatalog::new(config.catalog.cities_path.clone()));
        let (upstream, upstream_state) =
            UpstreamClient::from_config(&config.weather, &config.catalog, catalog.clone())?;

        let pipeline = Self::new(
            catalog,
            upstream,
            Duration::from_secs(config.cache.ttl_seconds),
        );
        pipeline.register_reset_hook(upstream_state);
        Ok(pipeline)
    }

    /// Register more state to reset on `evict_all`.
    pub fn register_reset_hook(&self, hook: Arc<dyn Resettable>) {
        self.cache.register_reset_hook(hook);
    }

    async fn load(&self, city_id: &str) -> Result<WeatherReport, FetchFailure> {
        let fetched = self.upstream.fetch(city_id).await?;
        let comfort = comfort::score_snapshot(&fetched.snapshot);

        let report = WeatherReport {
            snapshot: fetched.snapshot,
            comfort,
            cache_status: CacheStatus::Miss,
            data_source: fetched.source,
            timestamp: Utc::now(),
        };

        match fetched.degraded_reason {
            Some(reason) => Err(FetchFailure::Degraded {
                report: Box::new(report),
                reason,
            }),
            None => Ok(report),
        }
    }

    /// Weather and comfort for one city.
    ///
    /// Upstream failures never surface here: degraded mock data is served with
    /// `ERROR`, and a catalog city with no data gets a `FALLBACK` record.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed id; `NotFound` when the city is unknown
    /// and nothing can be synthesized for it.
    pub async fn get_city(
        &self,
        city_id: &str,
        force_refresh: bool,
    ) -> Result<WeatherReport, ServiceError> {
        validate_city_id(city_id)?;

        let result = self
            .cache
            .get_or_load(city_id, force_refresh, || self.load(city_id))
            .await;

        match result {
            Ok(lookup) => Ok(lookup.value.with_status(lookup.status)),
            Err(FetchFailure::Degraded { report, reason }) => {
                tracing::debug!("Serving degraded data for {}: {}", city_id, reason);
                Ok((*report).with_status(CacheStatus::Error))
            }
            Err(FetchFailure::Unavailable { reason }) => match self.catalog.find(city_id) {
                Some(city) => {
                    tracing::warn!(
                        "No weather for {} ({}): {}; serving fallback record",
                        city.name,
                        city_id,
                        reason
                    );
                    Ok(fallback_report(&city))
                }
                None => {
                    tracing::info!("City {} not found: {}", city_id, reason);
                    self.cache.forget(city_id);
                    Err(ServiceError::NotFound(city_id.to_string()))
                }
            },
        }
    }

    /// Every catalog city, most comfortable first.
    ///
    /// Cities are fetched one at a time in catalog order. A city that fails is
    /// logged and left out. Ties keep catalog order.
    pub async fn get_all(&self, force_refresh: bool) -> Vec<RankedWeather> {
        let cities = self.catalog.load();
        let mut reports = Vec::with_capacity(cities.len());

        for city in cities.iter() {
            match self.get_city(&city.id, force_refresh).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("Skipping {} ({}): {}", city.name, city.id, e),
            }
        }

        reports.sort_by(|a, b| b.score().total_cmp(&a.score()));
        tracing::info!("Ranked {} of {} cities", reports.len(), cities.len());

        reports
            .into_iter()
            .enumerate()
            .map(|(index, report)| RankedWeather {
                rank: index + 1,
                report,
            })
            .collect()
    }

    /// Comfort breakdown for one city.
    pub async fn comfort_index(&self, city_id: &str) -> Result<ComfortBreakdown, ServiceError> {
        Ok(self.get_city(city_id, false).await?.comfort)
    }

    pub fn cache_status(&self, city_id: &str) -> CacheStatusReport {
        self.cache.status(city_id)
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    /// Evict one city. Returns true if a cached value was removed.
    pub async fn evict(&self, city_id: &str) -> bool {
        self.cache.evict(city_id).await
    }

    /// Clear every city and reset the catalog and mock fixtures.
    pub async fn evict_all(&self) -> usize {
        self.cache.evict_all().await
    }

    pub fn supported_cities(&self) -> Vec<CityDescriptor> {
        self.catalog.load().as_ref().clone()
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            using_mock_data: self.upstream.is_mock(),
            cache_enabled: true,
            cache_duration_seconds: self.cache.ttl().as_secs(),
            total_supported_cities: self.catalog.load().len(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockGenerator;

    fn mock_pipeline() -> WeatherPipeline {
        let catalog = Arc::new(CityCatalog::builtin());
        let upstream = UpstreamClient::mock(MockGenerator::new(catalog.clone(), None, 0));
        WeatherPipeline::new(catalog, upstream, Duration::from_secs(300))
    }

    #[test]
    fn test_validate_city_id() {
        assert!(validate_city_id("1248991").is_ok());
        assert!(validate_city_id("1").is_ok());
        assert!(validate_city_id("123456789012").is_ok());

        for bad in ["", "abc", "12 34", "-1", "1234567890123", "１２"] {
            assert!(
                matches!(validate_city_id(bad), Err(ServiceError::InvalidInput(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_fallback_report() {
        let city = CityDescriptor::new("2147714", "Sydney", 27.3, WeatherCondition::Rain);
        let report = fallback_report(&city);

        assert_eq!(report.cache_status, CacheStatus::Fallback);
        assert_eq!(report.data_source, DataSource::Nominal);
        assert_eq!(report.comfort.comfort_score, 50.0);
        assert_eq!(report.comfort.comfort_level, ComfortLevel::Moderate);
        assert_eq!(report.comfort.humidity_impact, 100.0);
        assert_eq!(report.snapshot.humidity, 50.0);
        assert_eq!(report.snapshot.wind_speed, 3.0);
        assert_eq!(report.snapshot.cloudiness, Some(40));
        assert_eq!(report.snapshot.description.as_deref(), Some("Rain"));
    }

    #[tokio::test]
    async fn test_colombo_miss_then_hit() {
        let pipeline = mock_pipeline();

        let first = pipeline.get_city("1248991", false).await.unwrap();
        assert_eq!(first.snapshot.city_name, "Colombo");
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.data_source, DataSource::Mock);
        assert_eq!(first.comfort.temperature_impact, 0.0);
        assert!(first.comfort.comfort_level <= ComfortLevel::Moderate);

        let second = pipeline.get_city("1248991", false).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.comfort, first.comfort);

        let status = pipeline.cache_status("1248991");
        assert_eq!(status.cache_key, "cityWeather::1248991");
        assert_eq!(status.cache_status, CacheStatus::Hit);
        assert!(!status.is_expired);
    }

    #[tokio::test]
    async fn test_unknown_city_not_found() {
        let pipeline = mock_pipeline();
        assert_eq!(
            pipeline.get_city("999999999", false).await.unwrap_err(),
            ServiceError::NotFound("999999999".to_string())
        );
        assert!(pipeline.comfort_index("999999999").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_id_never_reaches_cache() {
        let pipeline = mock_pipeline();
        assert!(matches!(
            pipeline.get_city("paris", false).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(pipeline.cache_statistics().miss_count, 0);
        assert_eq!(pipeline.cache_status("paris").cache_status, CacheStatus::NotCached);
    }

    #[tokio::test]
    async fn test_comfort_index_matches_city() {
        let pipeline = mock_pipeline();
        let report = pipeline.get_city("2988507", false).await.unwrap();
        let breakdown = pipeline.comfort_index("2988507").await.unwrap();
        assert_eq!(breakdown, report.comfort);
    }

    #[tokio::test]
    async fn test_get_all_ranked() {
        let pipeline = mock_pipeline();
        let ranked = pipeline.get_all(false).await;

        assert_eq!(ranked.len(), 8);
        for (index, entry) in ranked.iter().enumerate() {
            assert_eq!(entry.rank, index + 1);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].report.score() >= pair[1].report.score());
        }
    }

    #[tokio::test]
    async fn test_system_info() {
        let pipeline = mock_pipeline();
        let info = pipeline.system_info();
        assert_eq!(info.service, "comfortcast");
        assert!(info.using_mock_data);
        assert!(info.cache_enabled);
        assert_eq!(info.cache_duration_seconds, 300);
        assert_eq!(info.total_supported_cities, 8);
        assert_eq!(pipeline.supported_cities().len(), 8);
    }
}
