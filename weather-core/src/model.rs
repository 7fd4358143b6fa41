use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Normalized weather reading, independent of the provider that produced it.
///
/// Instances are only built through [`WeatherObservation::new`], which rejects
/// payloads that cannot describe real weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    temperature: f64,
    humidity: f64,
    description: String,
}

impl WeatherObservation {
    pub fn new(
        temperature: f64,
        humidity: f64,
        description: impl Into<String>,
    ) -> Result<Self, WeatherError> {
        let description = description.into();

        if !temperature.is_finite() {
            return Err(WeatherError::ProtocolError(format!(
                "temperature is not a finite number: {temperature}"
            )));
        }
        if !humidity.is_finite() || !(0.0..=100.0).contains(&humidity) {
            return Err(WeatherError::ProtocolError(format!(
                "humidity out of range: {humidity}"
            )));
        }
        if description.trim().is_empty() {
            return Err(WeatherError::ProtocolError("missing weather description".into()));
        }

        Ok(Self { temperature, humidity, description })
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity, percent.
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
