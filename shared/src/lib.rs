use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Identity of a destination, used to fit the map once per destination.
    pub fn key(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub display_name: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantId {
    Fastest,
    Efficient,
    Safest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub id: VariantId,
    pub name: String,
    pub distance_km: f64,
    pub duration_min: u32,
    pub battery_impact_pct: u32,
    pub elevation_gain_m: u32,
    #[serde(default)]
    pub is_recommended: bool,
    pub requires_charging_stop: bool,
    pub smart_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_station_id: Option<String>,
}

/// Occupancy as reported by the station feed. No live feed exists, so this is
/// advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingStation {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub available_connectors: u32,
    pub total_connectors: u32,
    pub power_kw: f64,
    pub price_eur: f64,
    pub status: StationStatus,
}

/// Bounding box of the visible map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Viewport {
    /// Smallest box enclosing every point, `None` for an empty slice.
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for p in &points[1..] {
            bounds.south = bounds.south.min(p.lat);
            bounds.north = bounds.north.max(p.lat);
            bounds.west = bounds.west.min(p.lng);
            bounds.east = bounds.east.max(p.lng);
        }
        Some(bounds)
    }

    /// Key identifying this viewport for re-query decisions.
    ///
    /// Rounded to 4 decimals (~10m) so sub-pixel jitter from the map does not
    /// count as a new area.
    pub fn key(&self) -> String {
        format!(
            "{:.4},{:.4},{:.4},{:.4}",
            self.south, self.west, self.north, self.east
        )
    }
}

/// Area a station lookup is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchArea {
    Viewport(Viewport),
    Around { center: Coordinate, radius_m: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: u32,
    pub path: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedText {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temp_c: i32,
    pub condition: String,
    pub wind_kmh: i32,
    pub humidity_pct: f64,
    pub weather_code: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Planning,
    RouteLoading,
    RouteReady,
    Navigating,
    Ended,
}

/// Inputs the view layer feeds into a running navigation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionInput {
    LocationUpdated { location: Coordinate },
    ViewportChanged { viewport: Viewport },
    NavigationToggled { active: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user_location: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub active_route: Option<RouteOption>,
    pub path: Vec<Coordinate>,
    pub remaining_distance_km: Option<f64>,
    pub viewport: Option<Viewport>,
    pub charging_stations: Vec<ChargingStation>,
    pub smart_stop: Option<ChargingStation>,
    pub is_navigating: bool,
    pub is_loading_route: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_viewport_covers_all_points() {
        let path = vec![
            Coordinate::new(38.70, -9.20),
            Coordinate::new(38.80, -9.10),
            Coordinate::new(38.75, -9.30),
        ];
        let vp = Viewport::enclosing(&path).unwrap();
        assert_eq!(vp.south, 38.70);
        assert_eq!(vp.north, 38.80);
        assert_eq!(vp.west, -9.30);
        assert_eq!(vp.east, -9.10);
        assert!(path.iter().all(|p| {
            (vp.south..=vp.north).contains(&p.lat) && (vp.west..=vp.east).contains(&p.lng)
        }));
    }

    #[test]
    fn enclosing_empty_is_none() {
        assert!(Viewport::enclosing(&[]).is_none());
    }

    #[test]
    fn viewport_key_ignores_jitter() {
        let a = Viewport {
            south: 38.70001,
            west: -9.2,
            north: 38.8,
            east: -9.1,
        };
        let b = Viewport {
            south: 38.70002,
            ..a
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn search_area_is_tagged() {
        let area = SearchArea::Around {
            center: Coordinate::new(38.7, -9.1),
            radius_m: 8000,
        };
        let json = serde_json::to_value(area).unwrap();
        assert_eq!(json["kind"], "around");
        assert_eq!(json["radius_m"], 8000);
    }
}
