use async_trait::async_trait;
use serde::Deserialize;
use shared::{Coordinate, WeatherReport};

use crate::error::ProviderError;

/// Ambient conditions for display. The routing core never depends on it.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, at: Coordinate) -> Result<WeatherReport, ProviderError>;
}

pub struct OpenMeteo {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteo {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: u32,
    wind_speed_10m: f64,
}

/// Label for a WMO weather interpretation code.
pub fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1..=3 => "Partly cloudy",
        45..=48 => "Fog",
        51..=55 => "Drizzle",
        61..=65 => "Rain",
        71..=77 => "Snow",
        80..=82 => "Showers",
        95..=u32::MAX => "Thunderstorm",
        _ => "Unsettled",
    }
}

fn parse_report(body: &[u8]) -> Result<WeatherReport, ProviderError> {
    let response: ForecastResponse = serde_json::from_slice(body)?;
    let current = response.current.ok_or(ProviderError::Incomplete("current"))?;
    Ok(WeatherReport {
        temp_c: current.temperature_2m.round() as i32,
        condition: describe_weather_code(current.weather_code).to_string(),
        wind_kmh: current.wind_speed_10m.round() as i32,
        humidity_pct: current.relative_humidity_2m,
        weather_code: current.weather_code,
    })
}

#[async_trait]
impl WeatherProvider for OpenMeteo {
    async fn current(&self, at: Coordinate) -> Result<WeatherReport, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", at.lat.to_string()),
                ("longitude", at.lng.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m".to_string(),
                ),
                ("wind_speed_unit", "kmh".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }
        let body = response.bytes().await?;
        parse_report(&body)
    }
}
