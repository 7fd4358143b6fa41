use std::fmt;

use thiserror::Error;

/// Failures a weather query can end with.
///
/// Only `InvalidInput` and `AllProvidersFailed` ever reach callers of
/// [`crate::WeatherService::query`]; the per-provider kinds are consumed by the
/// failover chain and the audit log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("place not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected provider response: {0}")]
    ProtocolError(String),

    #[error("all weather providers failed for '{place}'")]
    AllProvidersFailed { place: String },

    #[error("no weather providers configured")]
    NoProvidersConfigured,

    #[error("cache not enabled")]
    CacheNotEnabled,

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Coarse classification used for log fields and failover decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unavailable,
    ProtocolError,
    AllProvidersFailed,
    NoProvidersConfigured,
    CacheNotEnabled,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::AllProvidersFailed => "all_providers_failed",
            ErrorKind::NoProvidersConfigured => "no_providers_configured",
            ErrorKind::CacheNotEnabled => "cache_not_enabled",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::InvalidInput(_) => ErrorKind::InvalidInput,
            WeatherError::NotFound(_) => ErrorKind::NotFound,
            WeatherError::Unavailable(_) => ErrorKind::Unavailable,
            WeatherError::ProtocolError(_) => ErrorKind::ProtocolError,
            WeatherError::AllProvidersFailed { .. } => ErrorKind::AllProvidersFailed,
            WeatherError::NoProvidersConfigured => ErrorKind::NoProvidersConfigured,
            WeatherError::CacheNotEnabled => ErrorKind::CacheNotEnabled,
            WeatherError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Cache backend failure. Absorbed by the caching decorator and never
/// surfaced to query callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("failed to (de)serialize cached observation: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend did not answer within {0:?}")]
    Timeout(std::time::Duration),
}
