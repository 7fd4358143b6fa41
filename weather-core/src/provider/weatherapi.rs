use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::WeatherObservation,
    provider::{ProviderId, http_client, require_place, status_error, transport_error},
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

// https://www.weatherapi.com/docs/#intro-error-codes
const CODE_QUERY_MISSING: u32 = 1003;
const CODE_INVALID_URL: u32 = 1005;
const CODE_NO_LOCATION: u32 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
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
        let url = format!("{}/current.json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", place)])
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::WeatherApi, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| transport_error(ProviderId::WeatherApi, e))?;

        if !status.is_success() {
            return Err(map_status(status, &body));
        }

        let parsed: WaResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::ProtocolError(format!("failed to parse WeatherAPI current JSON: {e}"))
        })?;

        WeatherObservation::new(
            parsed.current.temp_c,
            parsed.current.humidity,
            parsed.current.condition.text,
        )
    }
}

/// WeatherAPI reports most request problems as 400 with an error code in the
/// body, so the code decides the failure kind rather than the status.
fn map_status(status: StatusCode, body: &str) -> WeatherError {
    let error = serde_json::from_str::<WaErrorResponse>(body).ok().map(|r| r.error);

    match (status, error) {
        (StatusCode::BAD_REQUEST, Some(e)) if e.code == CODE_NO_LOCATION => {
            WeatherError::NotFound(format!("WeatherAPI: {}", e.message))
        }
        (StatusCode::BAD_REQUEST, Some(e))
            if e.code == CODE_QUERY_MISSING || e.code == CODE_INVALID_URL =>
        {
            WeatherError::InvalidInput(format!("WeatherAPI: {}", e.message))
        }
        (StatusCode::BAD_REQUEST, Some(e)) => {
            WeatherError::Unavailable(format!("WeatherAPI error {}: {}", e.code, e.message))
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, e) => WeatherError::Unavailable(
            format!(
                "WeatherAPI rejected credentials or quota exceeded: {}",
                e.map(|e| e.message).unwrap_or_default()
            ),
        ),
        _ => status_error(ProviderId::WeatherApi, status, body),
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    humidity: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaError,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        let place = require_place(place)?;
        self.fetch_current(place).await
    }

    fn describe(&self) -> String {
        ProviderId::WeatherApi.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> WeatherApiProvider {
        WeatherApiProvider::new("wa-key".into(), Some(format!("{}/", server.uri())))
            .expect("client")
    }

    fn error_body(code: u32, message: &str) -> serde_json::Value {
        json!({ "error": { "code": code, "message": message } })
    }

    #[tokio::test]
    async fn parses_current_weather() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("key", "wa-key"))
            .and(query_param("q", "Kyiv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": { "name": "Kyiv", "country": "Ukraine" },
                "current": {
                    "temp_c": -2.5,
                    "humidity": 93,
                    "condition": { "text": "Light snow" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let obs = provider(&server).get_weather("Kyiv").await.expect("observation");
        assert_eq!(obs.temperature(), -2.5);
        assert_eq!(obs.humidity(), 93.0);
        assert_eq!(obs.description(), "Light snow");
    }

    #[tokio::test]
    async fn no_matching_location_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(error_body(CODE_NO_LOCATION, "No matching location found.")),
            )
            .mount(&server)
            .await;

        let err = provider(&server).get_weather("Nowhere").await.unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_query_is_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(error_body(CODE_QUERY_MISSING, "Parameter q is missing.")),
            )
            .mount(&server)
            .await;

        let err = provider(&server).get_weather("x").await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn quota_and_server_errors_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(error_body(2007, "API key has exceeded calls per month quota.")),
            )
            .mount(&server)
            .await;
        let err = provider(&server).get_weather("Rome").await.unwrap_err();
        assert!(matches!(err, WeatherError::Unavailable(ref m) if m.contains("quota")));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let err = provider(&server).get_weather("Rome").await.unwrap_err();
        assert!(matches!(err, WeatherError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_condition_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": { "temp_c": 10.0, "humidity": 40 }
            })))
            .mount(&server)
            .await;

        let err = provider(&server).get_weather("Rome").await.unwrap_err();
        assert!(matches!(err, WeatherError::ProtocolError(_)));
    }
}
