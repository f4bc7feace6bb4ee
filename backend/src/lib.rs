pub mod advisor;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod gpx_export;
pub mod handlers;
pub mod location;
pub mod models;
pub mod registry;
pub mod routing;
pub mod runtime;
pub mod session;
pub mod session_handlers;
pub mod smart_stop;
pub mod stations;
pub mod variants;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use shared::Coordinate;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::advisor::{Advisor, CannedAdvisor, GeminiAdvisor};
use crate::config::AppConfig;
use crate::geocoder::{Geocoder, NominatimGeocoder};
use crate::location::{FixedLocation, LocationProvider};
use crate::registry::SessionRegistry;
use crate::routing::{OsrmRouter, RouteProvider};
use crate::runtime::SessionServices;
use crate::stations::StationLocator;
use crate::weather::{OpenMeteo, WeatherProvider};

const USER_AGENT: &str = concat!("greenpath/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct AppState {
    pub geocoder: Arc<dyn Geocoder>,
    pub router: Arc<dyn RouteProvider>,
    pub locator: Arc<StationLocator>,
    pub location: Arc<dyn LocationProvider>,
    pub advisor: Arc<dyn Advisor>,
    pub weather: Arc<dyn WeatherProvider>,
    pub sessions: Arc<SessionRegistry>,
    pub fallback_location: Coordinate,
    pub map_settle: Duration,
}

impl AppState {
    /// Wire the HTTP-backed providers described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            geocoder: Arc::new(NominatimGeocoder::new(
                client.clone(),
                config.geocoder_url.clone(),
                config.geocoder_email.clone(),
            )),
            router: Arc::new(OsrmRouter::new(client.clone(), config.router_url.clone())),
            locator: Arc::new(StationLocator::from_mirrors(
                &client,
                &config.station_mirrors,
                config.station_deadline,
            )),
            location: Arc::new(FixedLocation(config.device_location)),
            advisor: advisor_from_config(&client, config),
            weather: Arc::new(OpenMeteo::new(client, config.weather_url.clone())),
            sessions: Arc::new(SessionRegistry::new(config.session_idle_timeout)),
            fallback_location: config.fallback_location,
            map_settle: config.map_settle,
        })
    }

    pub fn session_services(&self) -> SessionServices {
        SessionServices {
            router: Arc::clone(&self.router),
            locator: Arc::clone(&self.locator),
            location: Arc::clone(&self.location),
            fallback_location: self.fallback_location,
            map_settle: self.map_settle,
        }
    }
}

/// Grounded advice when a key is configured, canned text otherwise.
fn advisor_from_config(client: &reqwest::Client, config: &AppConfig) -> Arc<dyn Advisor> {
    match &config.advisor_api_key {
        Some(key) => {
            tracing::info!("grounded advice via {}", config.advisor_model);
            Arc::new(GeminiAdvisor::new(
                client.clone(),
                config.advisor_url.clone(),
                config.advisor_model.clone(),
                key.clone(),
            ))
        }
        None => {
            tracing::info!("no advisor key configured, serving canned advice");
            Arc::new(CannedAdvisor)
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/geocode", get(handlers::geocode))
        .route("/api/routes/plan", post(handlers::plan_routes))
        .route("/api/stations", post(handlers::find_stations))
        .route("/api/weather", get(handlers::weather))
        .route("/api/advice/route", post(handlers::route_advice))
        .route("/api/advice/station", post(handlers::station_advice))
        .route("/api/sessions", post(session_handlers::create_session))
        .route(
            "/api/sessions/:id",
            get(session_handlers::get_session).delete(session_handlers::end_session),
        )
        .route("/api/sessions/:id/events", post(session_handlers::post_event))
        .route("/api/sessions/:id/gpx", get(session_handlers::export_gpx))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
