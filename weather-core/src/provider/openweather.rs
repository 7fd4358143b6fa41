use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::WeatherObservation,
    provider::{ProviderId, http_client, require_place, status_error, transport_error},
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, WeatherError> {
        Ok(Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http: http_client()?,
        })
    }

    async fn fetch_current(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        let url = format!("{}/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", place), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::OpenWeather, e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| transport_error(ProviderId::OpenWeather, e))?;

        if !status.is_success() {
            return Err(map_status(status, &body));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::ProtocolError(format!("failed to parse OpenWeather current JSON: {e}"))
        })?;

        let description = parsed
            .weather
            .first()
            .map(|w| w.description.clone())
            .ok_or_else(|| {
                WeatherError::ProtocolError("OpenWeather response has no weather entries".into())
            })?;

        WeatherObservation::new(parsed.main.temp, parsed.main.humidity, description)
    }
}

/// OpenWeather reports unknown cities as 404 and empty queries as 400; the body
/// carries `{"cod": "...", "message": "..."}`.
fn map_status(status: StatusCode, body: &str) -> WeatherError {
    let message = serde_json::from_str::<OwErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => WeatherError::NotFound(format!("OpenWeather: {message}")),
        StatusCode::UNAUTHORIZED => {
            WeatherError::Unavailable(format!("OpenWeather rejected credentials: {message}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            WeatherError::Unavailable(format!("OpenWeather rate limit exceeded: {message}"))
        }
        _ => status_error(ProviderId::OpenWeather, status, body),
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwErrorResponse {
    message: Option<String>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        let place = require_place(place)?;
        self.fetch_current(place).await
    }

    fn describe(&self) -> String {
        ProviderId::OpenWeather.to_string()
    }
}
