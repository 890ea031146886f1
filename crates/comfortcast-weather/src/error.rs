//! Weather-specific error types.

use comfortcast_core::AppError;
use thiserror::Error;

/// Failures surfaced to callers of the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("City not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(id) => format!("No weather is available for city {}", id),
            Self::InvalidInput(msg) => format!("Invalid request: {}", msg),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::Service(err.to_string())
    }
}

/// Failures fetching from the upstream provider or the mock backend.
///
/// Never surfaced by the pipeline: each one degrades to mock or nominal data.
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Provider response missing field: {0}")]
    MissingField(&'static str),

    #[error("Cannot synthesize weather for unknown city {0}")]
    UnknownCity(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl UpstreamError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::RetriesExhausted { .. } => {
                "Weather provider unreachable. Check your connection.".to_string()
            }
            Self::Timeout => "Weather provider timed out.".to_string(),
            Self::Status { status, .. } if *status == 401 => {
                "Weather provider rejected the API key.".to_string()
            }
            Self::Status { status, .. } => format!("Weather provider error ({}).", status),
            Self::Parse(_) | Self::MissingField(_) => {
                "Weather provider sent data we could not read.".to_string()
            }
            Self::UnknownCity(id) => format!("City {} is not supported", id),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Failures reading the city list. Absorbed by the built-in list.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read city list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse city list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("City list is empty: {0}")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_converts_to_app_error() {
        let app: AppError = ServiceError::NotFound("999999999".into()).into();
        assert!(matches!(app, AppError::Service(ref m) if m.contains("999999999")));
    }

    #[test]
    fn test_error_user_messages() {
        assert!(ServiceError::InvalidInput("id".into()).user_message().contains("Invalid"));
        assert!(UpstreamError::Status { status: 401, body: String::new() }
            .user_message()
            .contains("API key"));
        assert!(UpstreamError::Timeout.user_message().contains("timed out"));
    }
}
