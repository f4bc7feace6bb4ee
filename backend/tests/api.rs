use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use greenpath::{
    advisor::{CannedAdvisor, ROUTE_FALLBACK},
    create_router,
    error::{ProviderError, RoutingError},
    geocoder::Geocoder,
    location::FixedLocation,
    models::{CreateSessionResponse, GpxResponse, PlanResponse},
    registry::SessionRegistry,
    routing::RouteProvider,
    stations::{RawStation, StationLocator, StationSource, StationTags},
    variants::generate,
    weather::WeatherProvider,
    AppState,
};
use hyper::StatusCode;
use serde_json::{json, Value};
use shared::{
    ChargingStation, Coordinate, GeocodeResult, GroundedText, RouteSummary, SearchArea,
    SessionPhase, SessionSnapshot, VariantId, WeatherReport,
};
use tower::ServiceExt;

const HOME: Coordinate = Coordinate::new(38.7223, -9.1393);
const SINTRA: Coordinate = Coordinate::new(38.8029, -9.3817);

#[derive(Default)]
struct CountingGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn lookup(&self, query: &str) -> Result<Vec<GeocodeResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![GeocodeResult {
            display_name: format!("{query}, Portugal"),
            lat: 38.7223,
            lng: -9.1393,
        }])
    }
}

/// Always answers with a 50 km, 40 min ride to Sintra.
struct FixedRouter;

#[async_trait]
impl RouteProvider for FixedRouter {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        Ok(RouteSummary {
            distance_km: 50.0,
            duration_min: 40,
            path: vec![origin, Coordinate::new(38.76, -9.26), destination],
        })
    }
}

struct NoRoute;

#[async_trait]
impl RouteProvider for NoRoute {
    async fn route(&self, _: Coordinate, _: Coordinate) -> Result<RouteSummary, RoutingError> {
        Err(RoutingError::NoRoute)
    }
}

/// Five stations along the ride, whatever the area.
struct CorridorStations;

#[async_trait]
impl StationSource for CorridorStations {
    fn name(&self) -> &str {
        "corridor"
    }

    async fn fetch(&self, _area: &SearchArea) -> Result<Vec<RawStation>, ProviderError> {
        Ok((0..5)
            .map(|i| RawStation {
                id: 100 + i,
                lat: Some(38.73 + i as f64 * 0.01),
                lon: Some(-9.15 - i as f64 * 0.04),
                tags: StationTags {
                    name: Some(format!("Station {i}")),
                    operator: None,
                    power: Some("50 kW".into()),
                },
            })
            .collect())
    }
}

struct ClearSky;

#[async_trait]
impl WeatherProvider for ClearSky {
    async fn current(&self, _at: Coordinate) -> Result<WeatherReport, ProviderError> {
        Ok(WeatherReport {
            temp_c: 21,
            condition: "Clear sky".into(),
            wind_kmh: 9,
            humidity_pct: 55.0,
            weather_code: 0,
        })
    }
}

fn test_state(router: Arc<dyn RouteProvider>) -> (AppState, Arc<CountingGeocoder>) {
    let geocoder = Arc::new(CountingGeocoder::default());
    let state = AppState {
        geocoder: geocoder.clone(),
        router,
        locator: Arc::new(StationLocator::new(vec![Arc::new(CorridorStations)])),
        location: Arc::new(FixedLocation(Some(HOME))),
        advisor: Arc::new(CannedAdvisor),
        weather: Arc::new(ClearSky),
        sessions: Arc::new(SessionRegistry::new(Duration::from_secs(600))),
        fallback_location: HOME,
        map_settle: Duration::ZERO,
    };
    (state, geocoder)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn efficient_route() -> shared::RouteOption {
    generate(50.0, 40, 60)
        .into_iter()
        .find(|o| o.id == VariantId::Efficient)
        .unwrap()
}

async fn wait_for(
    state: &AppState,
    id: uuid::Uuid,
    ready: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let handle = state.sessions.get(&id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for(ready))
        .await
        .expect("session settled in time")
        .unwrap()
}

#[tokio::test]
async fn geocode_skips_short_queries() {
    let (state, geocoder) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/geocode?q=Li"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results: Vec<GeocodeResult> = read_json(response).await;
    assert!(results.is_empty());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);

    let response = app
        .oneshot(empty_request("GET", "/api/geocode?q=Lis"))
        .await
        .unwrap();
    let results: Vec<GeocodeResult> = read_json(response).await;
    assert_eq!(results.len(), 1);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn geocode_without_query_is_an_empty_list() {
    let (state, geocoder) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let response = app
        .oneshot(empty_request("GET", "/api/geocode"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results: Vec<GeocodeResult> = read_json(response).await;
    assert!(results.is_empty());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn plan_returns_three_variants_with_efficient_selected() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let payload = json!({
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng},
        "battery_pct": 60
    });
    let response = app
        .oneshot(json_request("POST", "/api/routes/plan", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let plan: PlanResponse = read_json(response).await;
    assert_eq!(plan.origin, HOME);
    assert_eq!(plan.selected, VariantId::Efficient);

    let summary: Vec<_> = plan
        .options
        .iter()
        .map(|o| (o.id, o.distance_km, o.battery_impact_pct, o.requires_charging_stop))
        .collect();
    assert_eq!(
        summary,
        vec![
            (VariantId::Fastest, 50.0, 70, true),
            (VariantId::Efficient, 52.5, 45, false),
            (VariantId::Safest, 54.0, 55, false),
        ]
    );
}

#[tokio::test]
async fn plan_reports_unroutable_destination() {
    let (state, _) = test_state(Arc::new(NoRoute));
    let app = create_router(state);

    let payload = json!({
        "origin": {"lat": HOME.lat, "lng": HOME.lng},
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng},
        "battery_pct": 80
    });
    let response = app
        .oneshot(json_request("POST", "/api/routes/plan", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error: shared::ApiError = read_json(response).await;
    assert_eq!(error.message, "Could not draw the route.");
}

#[tokio::test]
async fn plan_rejects_battery_above_full() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let payload = json!({
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng},
        "battery_pct": 120
    });
    let response = app
        .oneshot(json_request("POST", "/api/routes/plan", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stations_around_a_point_use_the_around_price() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let payload = json!({
        "area": {"kind": "around", "center": {"lat": HOME.lat, "lng": HOME.lng}, "radius_m": 8000}
    });
    let response = app
        .oneshot(json_request("POST", "/api/stations", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stations: Vec<ChargingStation> = read_json(response).await;
    assert_eq!(stations.len(), 5);
    assert!(stations.iter().all(|s| s.price_eur == 0.38 && s.power_kw == 50.0));
    assert_eq!(stations[0].id, "100");
}

#[tokio::test]
async fn session_suggests_middle_corridor_station() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state.clone());

    let payload = json!({
        "route": efficient_route(),
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng}
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/sessions", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CreateSessionResponse = read_json(response).await;

    let settled = wait_for(&state, created.id, |s| s.smart_stop.is_some()).await;
    assert_eq!(settled.phase, SessionPhase::RouteReady);
    assert_eq!(settled.charging_stations.len(), 5);
    assert_eq!(settled.smart_stop.as_ref().unwrap().id, "102");
    assert_eq!(
        settled.active_route.unwrap().suggested_station_id.as_deref(),
        Some("102")
    );

    let response = app
        .oneshot(empty_request("GET", &format!("/api/sessions/{}", created.id)))
        .await
        .unwrap();
    let snapshot: SessionSnapshot = read_json(response).await;
    assert_eq!(snapshot.path.len(), 3);
    assert_eq!(snapshot.remaining_distance_km, Some(50.0));
}

#[tokio::test]
async fn navigation_toggle_and_gpx_export() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state.clone());

    let payload = json!({
        "route": efficient_route(),
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng}
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/sessions", payload))
        .await
        .unwrap();
    let created: CreateSessionResponse = read_json(response).await;
    wait_for(&state, created.id, |s| !s.path.is_empty()).await;

    let event = json!({"type": "navigation_toggled", "active": true});
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{}/events", created.id),
            event,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let navigating = wait_for(&state, created.id, |s| s.is_navigating).await;
    assert_eq!(navigating.phase, SessionPhase::Navigating);

    let response = app
        .oneshot(empty_request(
            "GET",
            &format!("/api/sessions/{}/gpx", created.id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let gpx: GpxResponse = read_json(response).await;
    assert!(!gpx.gpx_base64.is_empty());
}

#[tokio::test]
async fn ending_a_session_removes_it() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state.clone());

    let payload = json!({
        "route": efficient_route(),
        "destination": {"lat": SINTRA.lat, "lng": SINTRA.lng}
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/sessions", payload))
        .await
        .unwrap();
    let created: CreateSessionResponse = read_json(response).await;
    let handle = state.sessions.get(&created.id).await.unwrap();

    let uri = format!("/api/sessions/{}", created.id);
    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let ended = tokio::time::timeout(
        Duration::from_secs(5),
        handle.wait_for(|s| s.phase == SessionPhase::Ended),
    )
    .await
    .expect("session ended in time")
    .unwrap();
    assert!(!ended.is_navigating);

    let response = app.oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let uri = format!("/api/sessions/{}/gpx", uuid::Uuid::new_v4());
    let response = app.oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn weather_and_canned_advice() {
    let (state, _) = test_state(Arc::new(FixedRouter));
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/weather?lat=38.72&lng=-9.14"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: WeatherReport = read_json(response).await;
    assert_eq!(report.condition, "Clear sky");

    let payload = json!({
        "origin": "Lisboa",
        "destination": "Sintra",
        "battery_pct": 60
    });
    let response = app
        .oneshot(json_request("POST", "/api/advice/route", payload))
        .await
        .unwrap();
    let advice: GroundedText = read_json(response).await;
    assert_eq!(advice.text, ROUTE_FALLBACK);
    assert!(advice.sources.is_empty());
}
