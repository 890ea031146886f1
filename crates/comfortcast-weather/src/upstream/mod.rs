//! Upstream weather source: the live provider or the mock generator.

pub mod live;
pub mod mock;
pub mod retry;
pub mod schema;

use std::sync::Arc;

use comfortcast_cache::Resettable;
use comfortcast_core::{CatalogConfig, WeatherConfig};

use crate::catalog::CityCatalog;
use crate::error::UpstreamError;
use crate::types::{DataSource, WeatherSnapshot};

pub use live::LiveClient;
pub use mock::MockGenerator;
pub use retry::RetryConfig;

/// A snapshot and where it came from.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub snapshot: WeatherSnapshot,
    pub source: DataSource,
    /// Why live data was replaced by mock data, if it was.
    pub degraded_reason: Option<String>,
}

/// Weather source selected by configuration.
#[derive(Clone)]
pub enum UpstreamClient {
    /// HTTP provider with mock fallback.
    Live(Arc<LiveClient>),

    /// Mock data only.
    Mock(Arc<MockGenerator>),
}

impl UpstreamClient {
    pub fn mock(generator: MockGenerator) -> Self {
        Self::Mock(Arc::new(generator))
    }

    pub fn live(client: LiveClient) -> Self {
        Self::Live(Arc::new(client))
    }

    /// Build the backend chosen by `weather.mock_enabled`.
    ///
    /// Also returns the mock generator, whose memoized fixtures must be reset
    /// whenever the cache is cleared.
    pub fn from_config(
        weather: &WeatherConfig,
        catalog_config: &CatalogConfig,
        catalog: Arc<CityCatalog>,
    ) -> Result<(Self, Arc<dyn Resettable>), UpstreamError> {
        let generator = Arc::new(MockGenerator::new(
            Arc::clone(&catalog),
            catalog_config.mock_data_path.clone(),
            weather.mock_seed,
        ));
        let hook: Arc<dyn Resettable> = generator.clone();

        let client = if weather.mock_enabled {
            tracing::info!("Using mock weather data");
            Self::Mock(generator)
        } else {
            tracing::info!("Using live weather provider at {}", weather.base_url);
            Self::live(LiveClient::new(weather, catalog, generator)?)
        };
        Ok((client, hook))
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }

    /// Fetch current weather for `city_id`.
    pub async fn fetch(&self, city_id: &str) -> Result<Fetched, UpstreamError> {
        match self {
            Self::Live(client) => client.fetch(city_id).await,
            Self::Mock(generator) => Ok(Fetched {
                snapshot: generator.fetch(city_id)?,
                source: DataSource::Mock,
                degraded_reason: None,
            }),
        }
    }
}
