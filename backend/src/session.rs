//! Live navigation session.
//!
//! [`NavigationSession::handle`] is a pure transition: it consumes one
//! [`SessionEvent`] and returns the [`Effect`]s a runtime has to perform.
//! Completed effects come back as events carrying the [`RequestId`] they were
//! issued with, which is how stale answers are recognised and dropped.

use shared::{
    ChargingStation, Coordinate, RouteOption, RouteSummary, SearchArea, SessionPhase,
    SessionSnapshot, Viewport,
};

use crate::error::RoutingError;
use crate::smart_stop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug)]
pub enum SessionEvent {
    /// A route option was picked during planning.
    DestinationSelected {
        route: RouteOption,
        destination: Coordinate,
    },
    LocationUpdated(Coordinate),
    RouteResolved {
        request: RequestId,
        result: Result<RouteSummary, RoutingError>,
    },
    /// The map panned, zoomed or finished fitting.
    ViewportChanged(Viewport),
    StationsResolved {
        request: RequestId,
        stations: Vec<ChargingStation>,
    },
    NavigationToggled(bool),
    /// The rider left the map for the home screen.
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchRoute {
        request: RequestId,
        origin: Coordinate,
        destination: Coordinate,
    },
    /// Fit the map to a freshly computed route corridor.
    FitViewport(Viewport),
    LocateStations {
        request: RequestId,
        area: SearchArea,
    },
    CancelStations(RequestId),
    /// Message for the rider.
    Notify(String),
    /// Cancel everything still in flight and stop.
    Shutdown,
}

#[derive(Debug)]
struct PendingLocate {
    request: RequestId,
    /// Whether the answer decides the smart stop for a new corridor.
    selects_smart_stop: bool,
}

#[derive(Debug, Default)]
pub struct NavigationSession {
    user_location: Option<Coordinate>,
    destination: Option<Coordinate>,
    active_route: Option<RouteOption>,
    path: Vec<Coordinate>,
    remaining_distance_km: Option<f64>,
    viewport: Option<Viewport>,
    charging_stations: Vec<ChargingStation>,
    smart_stop: Option<ChargingStation>,
    last_queried_viewport: Option<String>,
    fitted_destination: Option<String>,
    is_navigating: bool,
    ended: bool,
    pending_route: Option<RequestId>,
    pending_stations: Option<PendingLocate>,
    last_error: Option<String>,
    next_request: u64,
}

impl NavigationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for a route picked during planning, plus the effects to start it.
    pub fn for_route(route: RouteOption, destination: Coordinate) -> (Self, Vec<Effect>) {
        let mut session = Self::new();
        let effects = session.handle(SessionEvent::DestinationSelected { route, destination });
        (session, effects)
    }

    pub fn phase(&self) -> SessionPhase {
        if self.ended {
            SessionPhase::Ended
        } else if self.is_navigating {
            SessionPhase::Navigating
        } else if self.pending_route.is_some() {
            SessionPhase::RouteLoading
        } else if self.remaining_distance_km.is_some() {
            SessionPhase::RouteReady
        } else {
            SessionPhase::Planning
        }
    }

    pub fn charging_stations(&self) -> &[ChargingStation] {
        &self.charging_stations
    }

    pub fn smart_stop(&self) -> Option<&ChargingStation> {
        self.smart_stop.as_ref()
    }

    pub fn active_route(&self) -> Option<&RouteOption> {
        self.active_route.as_ref()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.ended {
            tracing::debug!("session ended, ignoring {event:?}");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match event {
            SessionEvent::DestinationSelected { route, destination } => {
                tracing::info!("destination selected: {} via {:?}", destination.key(), route.id);
                self.active_route = Some(route);
                self.destination = Some(destination);
                self.request_route(&mut effects);
            }
            SessionEvent::LocationUpdated(location) => {
                self.user_location = Some(location);
                self.request_route(&mut effects);
            }
            SessionEvent::RouteResolved { request, result } => {
                self.on_route(request, result, &mut effects);
            }
            SessionEvent::ViewportChanged(viewport) => {
                self.viewport = Some(viewport);
                if self.last_queried_viewport.as_deref() != Some(viewport.key().as_str()) {
                    self.locate_stations(viewport, false, &mut effects);
                }
            }
            SessionEvent::StationsResolved { request, stations } => {
                self.on_stations(request, stations);
            }
            SessionEvent::NavigationToggled(active) => {
                tracing::info!("navigation {}", if active { "started" } else { "stopped" });
                self.is_navigating = active;
            }
            SessionEvent::End => {
                tracing::info!("session ended");
                self.ended = true;
                self.is_navigating = false;
                self.pending_route = None;
                if let Some(pending) = self.pending_stations.take() {
                    effects.push(Effect::CancelStations(pending.request));
                }
                effects.push(Effect::Shutdown);
            }
        }
        effects
    }

    fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Issued whenever location or destination changes and both are known.
    /// A newer request supersedes older ones without cancelling them.
    fn request_route(&mut self, effects: &mut Vec<Effect>) {
        let (Some(origin), Some(destination)) = (self.user_location, self.destination) else {
            return;
        };
        let request = self.next_request();
        self.pending_route = Some(request);
        effects.push(Effect::FetchRoute {
            request,
            origin,
            destination,
        });
    }

    fn on_route(
        &mut self,
        request: RequestId,
        result: Result<RouteSummary, RoutingError>,
        effects: &mut Vec<Effect>,
    ) {
        if self.pending_route != Some(request) {
            tracing::debug!("dropping superseded route answer {request:?}");
            return;
        }
        self.pending_route = None;

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!("route unavailable: {err}");
                let message = err.user_message().to_string();
                self.last_error = Some(message.clone());
                effects.push(Effect::Notify(message));
                return;
            }
        };

        self.last_error = None;
        self.remaining_distance_km = Some(summary.distance_km);
        self.path = summary.path;

        let Some(destination) = self.destination else {
            return;
        };
        let key = destination.key();
        if self.fitted_destination.as_deref() == Some(key.as_str()) {
            return;
        }

        let corridor = Viewport::enclosing(&self.path).or_else(|| {
            let origin = self.user_location?;
            Viewport::enclosing(&[origin, destination])
        });
        let Some(corridor) = corridor else {
            return;
        };

        self.fitted_destination = Some(key);
        self.viewport = Some(corridor);
        effects.push(Effect::FitViewport(corridor));
        // Navigating suppresses re-triggering the stop suggestion.
        let selects_smart_stop = !self.is_navigating;
        self.locate_stations(corridor, selects_smart_stop, effects);
    }

    fn locate_stations(
        &mut self,
        viewport: Viewport,
        selects_smart_stop: bool,
        effects: &mut Vec<Effect>,
    ) {
        let mut selects_smart_stop = selects_smart_stop;
        if let Some(previous) = self.pending_stations.take() {
            // A corridor's pending suggestion carries over to the lookup that
            // superseded it, typically the viewport settling after the fit.
            selects_smart_stop |= previous.selects_smart_stop;
            effects.push(Effect::CancelStations(previous.request));
        }

        let request = self.next_request();
        self.last_queried_viewport = Some(viewport.key());
        self.pending_stations = Some(PendingLocate {
            request,
            selects_smart_stop,
        });
        effects.push(Effect::LocateStations {
            request,
            area: SearchArea::Viewport(viewport),
        });
    }

    fn on_stations(&mut self, request: RequestId, stations: Vec<ChargingStation>) {
        let is_current = self
            .pending_stations
            .as_ref()
            .is_some_and(|pending| pending.request == request);
        if !is_current {
            tracing::debug!("dropping superseded station answer {request:?}");
            return;
        }
        let Some(pending) = self.pending_stations.take() else {
            return;
        };

        self.charging_stations = stations;
        self.smart_stop = if pending.selects_smart_stop {
            self.active_route
                .as_ref()
                .and_then(|route| smart_stop::select(route, &self.charging_stations))
                .cloned()
        } else {
            // Keep the current suggestion only while it is still on the map.
            self.smart_stop.take().and_then(|stop| {
                self.charging_stations
                    .iter()
                    .find(|station| station.id == stop.id)
                    .cloned()
            })
        };

        if let Some(route) = self.active_route.as_mut() {
            route.suggested_station_id = self.smart_stop.as_ref().map(|s| s.id.clone());
        }
        if let Some(stop) = &self.smart_stop {
            tracing::info!("recommended stop: {} ({})", stop.name, stop.id);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            user_location: self.user_location,
            destination: self.destination,
            active_route: self.active_route.clone(),
            path: self.path.clone(),
            remaining_distance_km: self.remaining_distance_km,
            viewport: self.viewport,
            charging_stations: self.charging_stations.clone(),
            smart_stop: self.smart_stop.clone(),
            is_navigating: self.is_navigating,
            is_loading_route: self.pending_route.is_some(),
            last_error: self.last_error.clone(),
        }
    }
}
