use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Default upstream provider endpoint (OpenWeatherMap current-weather API).
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Environment variable prefix for overrides, e.g. `COMFORTCAST_CACHE__TTL_SECONDS=60`.
const ENV_PREFIX: &str = "COMFORTCAST";

/// Upper bound on `weather.retry_attempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// A setting [`Config::validate`] objected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path, e.g. `weather.base_url`.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of [`Config::validate`]. Errors stop startup, warnings are only logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }
}

/// The provider endpoint must be an absolute http(s) URL with a host.
fn check_base_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("not a URL ({})", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme must be http or https, got {}", url.scheme()));
    }
    if url.host().is_none() {
        return Err("URL has no host".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream provider settings
    pub weather: WeatherConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Static catalog and fixture locations
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Provider API key. Defaults to `$OPENWEATHER_API_KEY`.
    pub api_key: String,

    /// Provider base URL; `/weather` is appended per request.
    pub base_url: String,

    /// Serve deterministic mock data instead of calling the provider.
    pub mock_enabled: bool,

    /// Per-request timeout for the live provider.
    pub request_timeout_secs: u64,

    /// Retries for transient provider failures (timeouts, 5xx, 429).
    pub retry_attempts: u32,

    /// Seed mixed into the mock generator.
    pub mock_seed: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENWEATHER_API_KEY").unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mock_enabled: false,
            request_timeout_secs: 10,
            retry_attempts: 1,
            mock_seed: 0,
        }
    }
}

impl WeatherConfig {
    /// True if the live backend has credentials (not empty, not a placeholder).
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a fetched city stays fresh.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON city list. The built-in list is used when unset or unreadable.
    pub cities_path: Option<PathBuf>,

    /// JSON mock fixtures keyed by city id, shaped like provider responses.
    pub mock_data_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location plus environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path` (optional) layered under `COMFORTCAST_*` variables.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from `path` (or the default location), then validate.
    ///
    /// Validation errors are returned as `ConfigError::Invalid`; warnings are logged.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            let summary: Vec<String> = validation.errors.iter().map(ToString::to_string).collect();
            return Err(ConfigError::Invalid(summary.join("; ")));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        if let Err(message) = check_base_url(&weather.base_url) {
            result.error("weather.base_url", message);
        }
        if weather.request_timeout_secs == 0 {
            result.error("weather.request_timeout_secs", "must be at least 1 second");
        }
        if weather.retry_attempts > MAX_RETRY_ATTEMPTS {
            result.error(
                "weather.retry_attempts",
                format!("at most {} retries, got {}", MAX_RETRY_ATTEMPTS, weather.retry_attempts),
            );
        }
        if !weather.mock_enabled && !weather.has_api_key() {
            result.warn(
                "weather.api_key",
                "no API key for the live provider; every city will be served from mock data",
            );
        }

        match self.cache.ttl_seconds {
            0 => result.warn("cache.ttl_seconds", "0 disables caching, every lookup reloads"),
            ttl if ttl > 86_400 => result.warn("cache.ttl_seconds", "longer than a day"),
            _ => {}
        }

        if let Some(path) = self.catalog.cities_path.as_deref().filter(|p| !p.exists()) {
            result.warn(
                "catalog.cities_path",
                format!("{} not found, using built-in cities", path.display()),
            );
        }
        if let Some(path) = self.catalog.mock_data_path.as_deref().filter(|p| !p.exists()) {
            result.warn(
                "catalog.mock_data_path",
                format!("{} not found, mock data will be synthesized", path.display()),
            );
        }

        result
    }

    /// Render the configuration as TOML with the API key masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if !shown.weather.api_key.is_empty() {
            shown.weather.api_key = "***".to_string();
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join("comfortcast");

        Ok(config_dir.join("config.toml"))
    }
}
