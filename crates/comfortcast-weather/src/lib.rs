//! City weather with comfort scoring.
//!
//! Fetches current conditions from a live provider (falling back to mock data),
//! scores how comfortable they are, caches per city with single-flight loading,
//! and ranks the supported cities.

pub mod catalog;
pub mod comfort;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod upstream;

pub use catalog::CityCatalog;
pub use error::{CatalogError, ServiceError, UpstreamError};
pub use pipeline::{fallback_report, validate_city_id, FetchFailure, WeatherPipeline};
pub use types::*;
pub use upstream::{Fetched, LiveClient, MockGenerator, RetryConfig, UpstreamClient};
