use async_trait::async_trait;
use serde::Deserialize;
use shared::GeocodeResult;

use crate::error::ProviderError;

/// Shorter queries are never sent to the provider.
pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_RESULTS: usize = 5;

/// Free-text place lookup against a geocoding provider.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<GeocodeResult>, ProviderError>;
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    email: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, email: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            email,
        }
    }
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn into_result(self) -> Option<GeocodeResult> {
        let lat = self.lat.trim().parse().ok()?;
        let lng = self.lon.trim().parse().ok()?;
        Some(GeocodeResult {
            display_name: self.display_name,
            lat,
            lng,
        })
    }
}

fn parse_places(body: &[u8]) -> Result<Vec<GeocodeResult>, ProviderError> {
    let places: Vec<NominatimPlace> = serde_json::from_slice(body)?;
    let total = places.len();
    let results: Vec<GeocodeResult> = places
        .into_iter()
        .filter_map(NominatimPlace::into_result)
        .take(MAX_RESULTS)
        .collect();
    if results.len() < total.min(MAX_RESULTS) {
        tracing::debug!(
            "dropped {} geocode candidate(s) with unparseable coordinates",
            total.min(MAX_RESULTS) - results.len()
        );
    }
    Ok(results)
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Vec<GeocodeResult>, ProviderError> {
        let limit = MAX_RESULTS.to_string();
        let mut params = vec![
            ("format", "json"),
            ("q", query),
            ("addressdetails", "1"),
            ("limit", limit.as_str()),
        ];
        if let Some(email) = &self.email {
            params.push(("email", email.as_str()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }
        let body = response.bytes().await?;
        parse_places(&body)
    }
}

/// Resolve `text` to at most [`MAX_RESULTS`] candidates, in provider order.
///
/// Never fails: short queries, provider errors and empty matches all yield an
/// empty list.
pub async fn search(geocoder: &dyn Geocoder, text: &str) -> Vec<GeocodeResult> {
    if text.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }
    match geocoder.lookup(text).await {
        Ok(results) if results.is_empty() => {
            tracing::debug!("no geocode candidates for {text:?}");
            results
        }
        Ok(mut results) => {
            results.truncate(MAX_RESULTS);
            results
        }
        Err(err) => {
            tracing::warn!("geocoding {text:?} failed: {err}");
            Vec::new()
        }
    }
}
