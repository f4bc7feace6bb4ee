// Handlers for the planning endpoints: geocoding, route variants, stations
// and the display-only collaborators (weather, advice).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use shared::{ApiError, ChargingStation, Coordinate, GeocodeResult, GroundedText, WeatherReport};

use crate::advisor::{route_insight_or_fallback, station_details_or_fallback, RouteInsightRequest};
use crate::error::RoutingError;
use crate::geocoder::search;
use crate::location::resolve_location;
use crate::models::{
    GeocodeParams, PlanRequest, PlanResponse, RouteAdviceRequest, StationAdviceRequest,
    StationsRequest, WeatherParams,
};
use crate::variants::{generate, recommended};
use crate::AppState;

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            message: message.into(),
        }),
    )
}

/// GET /api/geocode?q= - Candidate destinations, empty on failure
pub async fn geocode(
    State(state): State<AppState>,
    Query(params): Query<GeocodeParams>,
) -> Json<Vec<GeocodeResult>> {
    Json(search(state.geocoder.as_ref(), &params.q).await)
}

/// POST /api/routes/plan - Three route variants for a destination
pub async fn plan_routes(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> ApiResult<PlanResponse> {
    if req.battery_pct > 100 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "battery_pct must be between 0 and 100",
        ));
    }
    let origin = match req.origin {
        Some(origin) => origin,
        None => resolve_location(state.location.as_ref(), state.fallback_location).await,
    };

    let base = state
        .router
        .route(origin, req.destination)
        .await
        .map_err(route_unavailable)?;
    let options = generate(base.distance_km, base.duration_min, req.battery_pct);
    let selected = recommended(&options)
        .map(|o| o.id)
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "no recommended variant"))?;

    tracing::info!(
        "planned {} variant(s) for {} km / {} min",
        options.len(),
        base.distance_km,
        base.duration_min
    );
    Ok(Json(PlanResponse {
        origin,
        destination: req.destination,
        base_distance_km: base.distance_km,
        base_duration_min: base.duration_min,
        options,
        selected,
    }))
}

fn route_unavailable(err: RoutingError) -> (StatusCode, Json<ApiError>) {
    tracing::warn!("route planning failed: {err}");
    api_error(StatusCode::BAD_GATEWAY, err.user_message())
}

/// POST /api/stations - Stations inside an area; never an error
pub async fn find_stations(
    State(state): State<AppState>,
    Json(req): Json<StationsRequest>,
) -> Json<Vec<ChargingStation>> {
    Json(state.locator.find_stations(&req.area).await)
}

/// GET /api/weather?lat=&lng= - Current conditions for display
pub async fn weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> ApiResult<WeatherReport> {
    state
        .weather
        .current(Coordinate::new(params.lat, params.lng))
        .await
        .map(Json)
        .map_err(|err| {
            tracing::warn!("weather lookup failed: {err}");
            api_error(StatusCode::BAD_GATEWAY, "Weather unavailable.")
        })
}

/// POST /api/advice/route - Grounded route summary, canned on failure
pub async fn route_advice(
    State(state): State<AppState>,
    Json(req): Json<RouteAdviceRequest>,
) -> Json<GroundedText> {
    let request = RouteInsightRequest {
        origin: req.origin,
        destination: req.destination,
        relief: req.relief,
        battery_pct: req.battery_pct,
        user_location: req.user_location,
    };
    Json(route_insight_or_fallback(state.advisor.as_ref(), &request).await)
}

/// POST /api/advice/station - Grounded station details, canned on failure
pub async fn station_advice(
    State(state): State<AppState>,
    Json(req): Json<StationAdviceRequest>,
) -> Json<GroundedText> {
    Json(station_details_or_fallback(state.advisor.as_ref(), &req.station, req.user_location).await)
}
