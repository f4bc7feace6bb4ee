use async_trait::async_trait;
use serde::Deserialize;
use shared::{Coordinate, RouteSummary};

use crate::error::{ProviderError, RoutingError};

/// Computes a driving path between two points.
///
/// Route fetches are idempotent GETs, so callers supersede stale requests by
/// ignoring their answers rather than cancelling them.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteSummary, RoutingError>;
}

pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// OSRM orders each pair longitude first.
    fn url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/{},{};{},{}",
            self.base_url.trim_end_matches('/'),
            origin.lng,
            origin.lat,
            destination.lng,
            destination.lat
        )
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
    #[serde(default)]
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn summarize(route: OsrmRoute) -> RouteSummary {
    let path = route
        .geometry
        .map(|g| {
            g.coordinates
                .into_iter()
                .map(|[lng, lat]| Coordinate::new(lat, lng))
                .collect()
        })
        .unwrap_or_default();

    RouteSummary {
        distance_km: round1(route.distance / 1000.0),
        duration_min: (route.duration / 60.0).round().max(0.0) as u32,
        path,
    }
}

fn parse_route(body: &[u8]) -> Result<RouteSummary, RoutingError> {
    let response: OsrmResponse = serde_json::from_slice(body).map_err(ProviderError::from)?;
    response
        .routes
        .into_iter()
        .next()
        .map(summarize)
        .ok_or(RoutingError::NoRoute)
}

#[async_trait]
impl RouteProvider for OsrmRouter {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        let url = self.url(origin, destination);
        tracing::debug!("requesting route {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await
            .map_err(ProviderError::from)?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()).into());
        }
        let body = response.bytes().await.map_err(ProviderError::from)?;
        let summary = parse_route(&body)?;

        tracing::info!(
            "route found: {} km, {} min, {} points",
            summary.distance_km,
            summary.duration_min,
            summary.path.len()
        );
        Ok(summary)
    }
}
