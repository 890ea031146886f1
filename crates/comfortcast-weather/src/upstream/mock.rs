//! Deterministic mock backend.
//!
//! Serves a fixture when one exists for the city, otherwise synthesizes plausible
//! readings around the catalog's nominal values. The RNG is seeded per city, so a
//! given seed always yields the same snapshot for the same city.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use comfortcast_cache::Resettable;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::schema::{icon_url, ProviderResponse};
use crate::catalog::CityCatalog;
use crate::error::UpstreamError;
use crate::types::{CityDescriptor, WeatherSnapshot};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a. Same output on every platform and toolchain.
fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub const MOCK_PRESSURE_HPA: f64 = 1013.0;
pub const MOCK_VISIBILITY_M: u32 = 10_000;
/// feels_like = temperature + this
pub const MOCK_FEELS_LIKE_OFFSET: f64 = 2.0;

type Fixtures = HashMap<String, ProviderResponse>;

pub struct MockGenerator {
    catalog: Arc<CityCatalog>,
    fixtures_path: Option<PathBuf>,
    fixtures: RwLock<Option<Arc<Fixtures>>>,
    seed: u64,
}

impl MockGenerator {
    pub fn new(catalog: Arc<CityCatalog>, fixtures_path: Option<PathBuf>, seed: u64) -> Self {
        Self {
            catalog,
            fixtures_path,
            fixtures: RwLock::new(None),
            seed,
        }
    }

    /// Mock snapshot for `city_id`.
    ///
    /// # Errors
    /// `UnknownCity` when there is neither a fixture nor a catalog entry;
    /// `MissingField` when the fixture lacks temperature or humidity.
    pub fn fetch(&self, city_id: &str) -> Result<WeatherSnapshot, UpstreamError> {
        let city = self.catalog.find(city_id);

        if let Some(fixture) = self.fixtures().get(city_id) {
            tracing::debug!("Serving mock fixture for {}", city_id);
            return fixture
                .clone()
                .into_snapshot(city_id, city.as_ref().map(|c| c.name.as_str()));
        }

        let city = city.ok_or_else(|| UpstreamError::UnknownCity(city_id.to_string()))?;
        Ok(self.synthesize(&city))
    }

    fn fixtures(&self) -> Arc<Fixtures> {
        if let Some(fixtures) = self.fixtures.read().as_ref() {
            return Arc::clone(fixtures);
        }

        let mut slot = self.fixtures.write();
        if let Some(fixtures) = slot.as_ref() {
            return Arc::clone(fixtures);
        }

        let fixtures = Arc::new(match &self.fixtures_path {
            Some(path) => read_fixtures(path),
            None => Fixtures::new(),
        });
        *slot = Some(Arc::clone(&fixtures));
        fixtures
    }

    fn rng_for(&self, city: &CityDescriptor) -> StdRng {
        let mut seed = FNV_OFFSET;
        for bytes in [
            &self.seed.to_le_bytes()[..],
            city.id.as_bytes(),
            &city.nominal_temp.to_bits().to_le_bytes()[..],
            city.nominal_condition.as_str().as_bytes(),
        ] {
            seed = fnv1a(seed, bytes);
            // separator so ("12", "3") and ("1", "23") differ
            seed = fnv1a(seed, &[0xff]);
        }
        StdRng::seed_from_u64(seed)
    }

    /// Plausible readings around the city's nominal values.
    pub fn synthesize(&self, city: &CityDescriptor) -> WeatherSnapshot {
        let mut rng = self.rng_for(city);
        let humidity: f64 = rng.gen_range(30.0..=70.0);
        let wind_speed: f64 = rng.gen_range(2.5..=7.5);
        let condition = &city.nominal_condition;

        WeatherSnapshot {
            city_id: city.id.clone(),
            city_name: city.name.clone(),
            country: None,
            temperature: city.nominal_temp,
            feels_like: Some(city.nominal_temp + MOCK_FEELS_LIKE_OFFSET),
            humidity: humidity.round(),
            pressure: Some(MOCK_PRESSURE_HPA),
            wind_speed: (wind_speed * 100.0).round() / 100.0,
            cloudiness: Some(condition.cloudiness()),
            visibility: Some(MOCK_VISIBILITY_M),
            description: Some(condition.description()),
            icon_url: Some(icon_url(condition.icon_code())),
        }
    }
}

/// Unreadable fixture files are logged and treated as empty.
fn read_fixtures(path: &Path) -> Fixtures {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Fixtures>(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(fixtures) => {
            tracing::info!("Loaded {} mock fixtures from {}", fixtures.len(), path.display());
            fixtures
        }
        Err(e) => {
            tracing::warn!("Ignoring mock fixtures at {}: {}", path.display(), e);
            Fixtures::new()
        }
    }
}

impl Resettable for MockGenerator {
    fn name(&self) -> &str {
        "mock fixtures"
    }

    fn reset(&self) {
        *self.fixtures.write() = None;
    }
}
