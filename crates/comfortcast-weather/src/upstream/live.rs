//! Live provider client.

use std::sync::Arc;
use std::time::Duration;

use comfortcast_core::WeatherConfig;
use tracing::instrument;

use super::mock::MockGenerator;
use super::retry::{with_retry, RetryConfig, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS};
use super::schema::ProviderResponse;
use super::Fetched;
use crate::catalog::CityCatalog;
use crate::error::UpstreamError;
use crate::types::{DataSource, WeatherSnapshot};

pub struct LiveClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
    catalog: Arc<CityCatalog>,
    fallback: Arc<MockGenerator>,
}

impl LiveClient {
    /// Build a client from config. `fallback` serves data when the provider fails.
    pub fn new(
        config: &WeatherConfig,
        catalog: Arc<CityCatalog>,
        fallback: Arc<MockGenerator>,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        if !config.has_api_key() {
            tracing::warn!("No provider API key configured; live requests will be rejected");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            retry: RetryConfig::new(
                config.retry_attempts,
                DEFAULT_INITIAL_DELAY_MS,
                DEFAULT_MAX_DELAY_MS,
            ),
            catalog,
            fallback,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/weather", self.base_url.trim_end_matches('/'))
    }

    /// Fetch from the provider only, without the mock fallback.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_live(&self, city_id: &str) -> Result<WeatherSnapshot, UpstreamError> {
        let url = self.endpoint();
        tracing::debug!("GET {}?id={}&appid=***&units=metric", url, city_id);

        let response = with_retry(&self.retry, || {
            self.client
                .get(&url)
                .query(&[
                    ("id", city_id),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                ])
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ProviderResponse = response.json().await?;
        let catalog_name = self.catalog.find(city_id).map(|city| city.name);
        body.into_snapshot(city_id, catalog_name.as_deref())
    }

    /// Fetch from the provider, degrading to mock data on any failure.
    ///
    /// # Errors
    /// Only when the mock fallback cannot produce a snapshot either.
    pub async fn fetch(&self, city_id: &str) -> Result<Fetched, UpstreamError> {
        match self.fetch_live(city_id).await {
            Ok(snapshot) => Ok(Fetched {
                snapshot,
                source: DataSource::Live,
                degraded_reason: None,
            }),
            Err(e) => {
                tracing::warn!("Live fetch for {} failed ({}), using mock data", city_id, e);
                let snapshot = self.fallback.fetch(city_id)?;
                Ok(Fetched {
                    snapshot,
                    source: DataSource::MockFallback,
                    degraded_reason: Some(e.to_string()),
                })
            }
        }
    }
}
