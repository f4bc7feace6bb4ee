use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shared::{ChargingStation, Coordinate, SearchArea, StationStatus};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

pub const DEFAULT_RADIUS_M: u32 = 8_000;
pub const DEFAULT_POWER_KW: f64 = 22.0;
pub const FALLBACK_STATION_NAME: &str = "Posto Mobi.E";
/// Server-side budget requested in every query.
pub const QUERY_TIMEOUT_SECS: u32 = 15;
pub const VIEWPORT_RESULT_CAP: usize = 40;

// No pricing or occupancy feed exists; these are placeholders.
const VIEWPORT_PRICE_EUR: f64 = 0.35;
const AROUND_PRICE_EUR: f64 = 0.38;
const PLACEHOLDER_AVAILABLE_CONNECTORS: u32 = 1;
const PLACEHOLDER_TOTAL_CONNECTORS: u32 = 2;

/// The lookup was cancelled by a newer one; its result must be discarded.
#[derive(Debug, thiserror::Error)]
#[error("station lookup cancelled")]
pub struct LocateCancelled;

/// One interchangeable source of station data.
#[async_trait]
pub trait StationSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, area: &SearchArea) -> Result<Vec<RawStation>, ProviderError>;
}

/// A tagged point record as served by the station data provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStation {
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: StationTags,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationTags {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub power: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Option<Vec<RawStation>>,
}

pub fn overpass_query(area: &SearchArea) -> String {
    match area {
        SearchArea::Viewport(vp) => format!(
            "[out:json][timeout:{QUERY_TIMEOUT_SECS}];node[\"amenity\"=\"charging_station\"]({},{},{},{});out {VIEWPORT_RESULT_CAP};",
            vp.south, vp.west, vp.north, vp.east
        ),
        SearchArea::Around { center, radius_m } => format!(
            "[out:json][timeout:{QUERY_TIMEOUT_SECS}];node[\"amenity\"=\"charging_station\"](around:{radius_m},{},{});out;",
            center.lat, center.lng
        ),
    }
}

/// An Overpass interpreter endpoint.
pub struct OverpassMirror {
    client: reqwest::Client,
    endpoint: String,
    deadline: Option<Duration>,
}

impl OverpassMirror {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, deadline: Option<Duration>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            deadline,
        }
    }

    async fn request(&self, query: &str) -> Result<Vec<RawStation>, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("data", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }
        let body = response.bytes().await?;
        parse_elements(&body)
    }
}

fn parse_elements(body: &[u8]) -> Result<Vec<RawStation>, ProviderError> {
    let response: OverpassResponse = serde_json::from_slice(body)?;
    response.elements.ok_or(ProviderError::Incomplete("elements"))
}

#[async_trait]
impl StationSource for OverpassMirror {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, area: &SearchArea) -> Result<Vec<RawStation>, ProviderError> {
        let query = overpass_query(area);
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.request(&query))
                .await
                .map_err(|_| ProviderError::DeadlineExceeded(deadline))?,
            None => self.request(&query).await,
        }
    }
}

/// Reads the leading number of a `power` tag such as `"50 kW"` or `"22"`.
pub fn parse_power_kw(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map_or(raw.len(), |(i, _)| i);
    let value: f64 = raw[..end].replace(',', ".").parse().ok()?;
    (value > 0.0).then_some(value)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Map a raw record to a station; records without coordinates are skipped.
pub fn normalize(raw: RawStation, area: &SearchArea) -> Option<ChargingStation> {
    let (lat, lng) = (raw.lat?, raw.lon?);
    let tags = raw.tags;
    let power_kw = tags
        .power
        .as_deref()
        .and_then(parse_power_kw)
        .unwrap_or(DEFAULT_POWER_KW);
    let name = non_empty(tags.name)
        .or_else(|| non_empty(tags.operator))
        .unwrap_or_else(|| FALLBACK_STATION_NAME.to_string());
    let price_eur = match area {
        SearchArea::Viewport(_) => VIEWPORT_PRICE_EUR,
        SearchArea::Around { .. } => AROUND_PRICE_EUR,
    };

    Some(ChargingStation {
        id: raw.id.to_string(),
        name,
        lat,
        lng,
        available_connectors: PLACEHOLDER_AVAILABLE_CONNECTORS,
        total_connectors: PLACEHOLDER_TOTAL_CONNECTORS,
        power_kw,
        price_eur,
        status: StationStatus::Available,
    })
}

/// Finds charging stations, trying each source in priority order.
pub struct StationLocator {
    sources: Vec<Arc<dyn StationSource>>,
}

impl StationLocator {
    pub fn new(sources: Vec<Arc<dyn StationSource>>) -> Self {
        Self { sources }
    }

    pub fn from_mirrors(
        client: &reqwest::Client,
        mirrors: &[String],
        deadline: Option<Duration>,
    ) -> Self {
        let sources = mirrors
            .iter()
            .map(|endpoint| {
                Arc::new(OverpassMirror::new(client.clone(), endpoint.clone(), deadline))
                    as Arc<dyn StationSource>
            })
            .collect();
        Self::new(sources)
    }

    /// Stations inside `area`; empty when every source fails.
    pub async fn find_stations(&self, area: &SearchArea) -> Vec<ChargingStation> {
        let never = CancellationToken::new();
        self.find_stations_cancellable(area, &never)
            .await
            .unwrap_or_default()
    }

    /// Like [`find_stations`](Self::find_stations), but aborts the in-flight
    /// request as soon as `cancel` fires.
    ///
    /// The first source that answers with a parseable payload is authoritative;
    /// later sources are not consulted.
    pub async fn find_stations_cancellable(
        &self,
        area: &SearchArea,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChargingStation>, LocateCancelled> {
        for source in &self.sources {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LocateCancelled),
                attempt = source.fetch(area) => attempt,
            };

            match attempt {
                Ok(raw) => {
                    let stations: Vec<ChargingStation> =
                        raw.into_iter().filter_map(|r| normalize(r, area)).collect();
                    tracing::info!(
                        "{} charging station(s) from {}",
                        stations.len(),
                        source.name()
                    );
                    return Ok(stations);
                }
                Err(err) => {
                    tracing::warn!("station mirror {} failed: {err}", source.name());
                }
            }
        }

        tracing::warn!("all {} station mirror(s) failed", self.sources.len());
        Ok(Vec::new())
    }
}

/// Area used to show stations around the rider before any route exists.
pub fn around(center: Coordinate) -> SearchArea {
    SearchArea::Around {
        center,
        radius_m: DEFAULT_RADIUS_M,
    }
}
