//! Supported city list.
//!
//! Loaded once from a JSON file and handed out as an immutable `Arc` snapshot.
//! Any read or parse failure falls back to the built-in list, so loading never fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use comfortcast_cache::Resettable;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::types::{CityDescriptor, WeatherCondition};

/// Temperature used when a record's `Temp` cannot be parsed.
pub const DEFAULT_NOMINAL_TEMP: f64 = 25.0;

/// One record of the cities file.
#[derive(Debug, Deserialize)]
struct CityRecord {
    #[serde(rename = "CityCode")]
    city_code: String,
    #[serde(rename = "CityName")]
    city_name: String,
    #[serde(rename = "Temp")]
    temp: TempField,
    #[serde(rename = "Status")]
    status: String,
}

/// `Temp` is string-encoded in the file; plain numbers are tolerated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TempField {
    Text(String),
    Number(f64),
}

impl CityRecord {
    fn into_descriptor(self) -> CityDescriptor {
        let nominal_temp = match &self.temp {
            TempField::Number(n) => *n,
            TempField::Text(raw) => raw.trim().parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(
                    "City {} has unparsable temperature {:?}, using {}",
                    self.city_code,
                    raw,
                    DEFAULT_NOMINAL_TEMP
                );
                DEFAULT_NOMINAL_TEMP
            }),
        };

        CityDescriptor {
            id: self.city_code.trim().to_string(),
            name: self.city_name,
            nominal_temp,
            nominal_condition: WeatherCondition::from(self.status),
        }
    }
}

/// The fixed list served when no city file is configured or it cannot be read.
pub fn builtin_cities() -> Vec<CityDescriptor> {
    vec![
        CityDescriptor::new("1248991", "Colombo", 33.0, WeatherCondition::Clouds),
        CityDescriptor::new("1850147", "Tokyo", 8.6, WeatherCondition::Clear),
        CityDescriptor::new("2644210", "Liverpool", 16.5, WeatherCondition::Rain),
        CityDescriptor::new("2988507", "Paris", 22.4, WeatherCondition::Clear),
        CityDescriptor::new("2147714", "Sydney", 27.3, WeatherCondition::Rain),
        CityDescriptor::new("4930956", "Boston", 4.2, WeatherCondition::Mist),
        CityDescriptor::new("1796236", "Shanghai", 10.1, WeatherCondition::Clouds),
        CityDescriptor::new("3143244", "Oslo", -3.9, WeatherCondition::Clear),
    ]
}

/// Parse a cities file. An empty list is an error.
pub fn read_cities_file(path: &Path) -> Result<Vec<CityDescriptor>, CatalogError> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<CityRecord> = serde_json::from_str(&content)?;

    if records.is_empty() {
        return Err(CatalogError::Empty(path.display().to_string()));
    }

    Ok(records.into_iter().map(CityRecord::into_descriptor).collect())
}

pub struct CityCatalog {
    source: Option<PathBuf>,
    cities: RwLock<Option<Arc<Vec<CityDescriptor>>>>,
}

impl CityCatalog {
    /// Catalog backed by `source`, or by the built-in list when `None`.
    pub fn new(source: Option<PathBuf>) -> Self {
        Self {
            source,
            cities: RwLock::new(None),
        }
    }

    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// All cities in catalog order. Reads the source on first use only.
    pub fn load(&self) -> Arc<Vec<CityDescriptor>> {
        if let Some(cities) = self.cities.read().as_ref() {
            return Arc::clone(cities);
        }

        let mut slot = self.cities.write();
        // Another caller may have loaded while we waited for the write lock
        if let Some(cities) = slot.as_ref() {
            return Arc::clone(cities);
        }

        let cities = Arc::new(self.read_source());
        *slot = Some(Arc::clone(&cities));
        cities
    }

    fn read_source(&self) -> Vec<CityDescriptor> {
        let Some(path) = &self.source else {
            tracing::debug!("No city file configured, using built-in cities");
            return builtin_cities();
        };

        match read_cities_file(path) {
            Ok(cities) => {
                tracing::info!("Loaded {} cities from {}", cities.len(), path.display());
                cities
            }
            Err(e) => {
                tracing::warn!("{}; using built-in cities", e);
                builtin_cities()
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<CityDescriptor> {
        self.load().iter().find(|city| city.id == id).cloned()
    }

    /// Drop the memoized list; the next `load` re-reads the source.
    pub fn reset_cache(&self) {
        *self.cities.write() = None;
        tracing::debug!("City catalog reset");
    }
}

impl Resettable for CityCatalog {
    fn name(&self) -> &str {
        "city catalog"
    }

    fn reset(&self) {
        self.reset_cache();
    }
}
