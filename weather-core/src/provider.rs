use crate::{
    ProviderConfiguration, WeatherError, WeatherObservation,
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod weatherapi;

/// Upper bound for a single provider round-trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Capability shared by source adapters, the failover chain and every decorator.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError>;

    /// Short label describing this component and whatever it wraps.
    fn describe(&self) -> String;
}

/// Construct a source adapter from the resolved configuration.
pub fn provider_from_config(
    id: ProviderId,
    config: &ProviderConfiguration,
) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    let credentials = config.credentials.get(&id).ok_or_else(|| {
        WeatherError::Configuration(format!(
            "No API key configured for provider '{id}'. \
             Hint: run `weather configure {id}` and enter your API key."
        ))
    })?;

    let api_key = credentials.api_key.clone();
    let base_url = credentials.base_url.clone();

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(api_key, base_url)?),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::new(api_key, base_url)?),
    };

    Ok(provider)
}

pub(crate) fn http_client() -> Result<Client, WeatherError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| WeatherError::Configuration(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn require_place(place: &str) -> Result<&str, WeatherError> {
    let place = place.trim();
    if place.is_empty() {
        return Err(WeatherError::InvalidInput("place must not be empty".into()));
    }
    Ok(place)
}

pub(crate) fn transport_error(id: ProviderId, err: reqwest::Error) -> WeatherError {
    if err.is_timeout() {
        WeatherError::Unavailable(format!("{id} request timed out"))
    } else {
        WeatherError::Unavailable(format!("{id} request failed: {err}"))
    }
}

/// Status-code mapping shared by all adapters; provider-specific codes are
/// handled by the adapter before falling back to this.
pub(crate) fn status_error(id: ProviderId, status: StatusCode, body: &str) -> WeatherError {
    let detail = format!("{id} responded with {status}: {}", truncate_body(body));
    match status {
        StatusCode::NOT_FOUND => WeatherError::NotFound(detail),
        StatusCode::BAD_REQUEST => WeatherError::InvalidInput(detail),
        _ => WeatherError::Unavailable(detail),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default().resolve().expect("default config resolves");
        let err = provider_from_config(ProviderId::OpenWeather, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".to_string());
        let resolved = cfg.resolve().expect("config resolves");

        let provider = provider_from_config(ProviderId::WeatherApi, &resolved).expect("built");
        assert_eq!(provider.describe(), "weatherapi");
    }

    #[test]
    fn require_place_trims_and_rejects_blank() {
        assert_eq!(require_place("  Kyiv ").unwrap(), "Kyiv");
        assert!(matches!(require_place("   "), Err(WeatherError::InvalidInput(_))));
    }

    #[test]
    fn status_mapping_is_uniform() {
        let id = ProviderId::OpenWeather;
        assert!(matches!(
            status_error(id, StatusCode::NOT_FOUND, ""),
            WeatherError::NotFound(_)
        ));
        assert!(matches!(
            status_error(id, StatusCode::TOO_MANY_REQUESTS, ""),
            WeatherError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(id, StatusCode::BAD_GATEWAY, ""),
            WeatherError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(id, StatusCode::UNAUTHORIZED, ""),
            WeatherError::Unavailable(_)
        ));
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(300);
        assert_eq!(truncate_body(&long).len(), 203);
    }
}
