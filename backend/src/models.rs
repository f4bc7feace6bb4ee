use serde::{Deserialize, Serialize};
use shared::{ChargingStation, Coordinate, RouteOption, SearchArea, SessionSnapshot, VariantId};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
    /// Missing behaves like an empty query.
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanRequest {
    pub destination: Coordinate,
    /// Device position when omitted.
    #[serde(default)]
    pub origin: Option<Coordinate>,
    pub battery_pct: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub base_distance_km: f64,
    pub base_duration_min: u32,
    pub options: Vec<RouteOption>,
    pub selected: VariantId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StationsRequest {
    pub area: SearchArea,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub route: RouteOption,
    pub destination: Coordinate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: Uuid,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GpxResponse {
    pub gpx_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct WeatherParams {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteAdviceRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub relief: String,
    pub battery_pct: u32,
    #[serde(default)]
    pub user_location: Option<Coordinate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StationAdviceRequest {
    pub station: ChargingStation,
    pub user_location: Coordinate,
}
