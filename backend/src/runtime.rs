use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::{Coordinate, RouteOption, SessionInput, SessionSnapshot};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::location::{resolve_location, LocationProvider};
use crate::routing::RouteProvider;
use crate::session::{Effect, NavigationSession, RequestId, SessionEvent};
use crate::stations::StationLocator;

/// Collaborators a session calls out to.
#[derive(Clone)]
pub struct SessionServices {
    pub router: Arc<dyn RouteProvider>,
    pub locator: Arc<StationLocator>,
    pub location: Arc<dyn LocationProvider>,
    pub fallback_location: Coordinate,
    /// Lets the map mount before the first fit.
    pub map_settle: Duration,
}

#[derive(Debug, thiserror::Error)]
#[error("navigation session is no longer running")]
pub struct SessionClosed;

/// Cheap handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn send(&self, input: SessionInput) -> Result<(), SessionClosed> {
        let event = match input {
            SessionInput::LocationUpdated { location } => SessionEvent::LocationUpdated(location),
            SessionInput::ViewportChanged { viewport } => SessionEvent::ViewportChanged(viewport),
            SessionInput::NavigationToggled { active } => SessionEvent::NavigationToggled(active),
        };
        self.inputs.send(event).map_err(|_| SessionClosed)
    }

    pub fn end(&self) -> Result<(), SessionClosed> {
        self.inputs.send(SessionEvent::End).map_err(|_| SessionClosed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until the published snapshot satisfies `ready`.
    pub async fn wait_for(
        &self,
        mut ready: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionClosed> {
        let mut snapshot = self.snapshot.clone();
        let current = snapshot
            .wait_for(|s| ready(s))
            .await
            .map_err(|_| SessionClosed)?;
        Ok(current.clone())
    }
}

/// Start a session for a route picked during planning.
///
/// The session runs on its own task; every mutation happens there, one event
/// at a time.
pub fn spawn_session(
    route: RouteOption,
    destination: Coordinate,
    services: SessionServices,
) -> SessionHandle {
    let (session, initial) = NavigationSession::for_route(route, destination);
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let runtime = SessionRuntime {
        session,
        services,
        inputs: input_rx,
        completions: done_rx,
        completions_tx: done_tx,
        snapshot: snapshot_tx,
        root: CancellationToken::new(),
        station_tokens: HashMap::new(),
    };
    tokio::spawn(runtime.run(initial));

    SessionHandle {
        inputs: input_tx,
        snapshot: snapshot_rx,
    }
}

struct SessionRuntime {
    session: NavigationSession,
    services: SessionServices,
    inputs: mpsc::UnboundedReceiver<SessionEvent>,
    completions: mpsc::UnboundedReceiver<SessionEvent>,
    completions_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    /// Parent of every in-flight request; cancelled when the session ends.
    root: CancellationToken,
    station_tokens: HashMap<RequestId, CancellationToken>,
}

impl SessionRuntime {
    async fn run(mut self, initial: Vec<Effect>) {
        self.spawn_location_query();
        tokio::time::sleep(self.services.map_settle).await;
        let mut running = self.perform(initial);
        self.publish();

        while running {
            let event = tokio::select! {
                Some(event) = self.completions.recv() => event,
                input = self.inputs.recv() => match input {
                    Some(event) => event,
                    // Every handle dropped: nobody can render this session anymore.
                    None => SessionEvent::End,
                },
            };

            if let SessionEvent::StationsResolved { request, .. } = &event {
                self.station_tokens.remove(request);
            }
            let effects = self.session.handle(event);
            running = self.perform(effects);
            self.publish();
        }

        self.root.cancel();
        self.publish();
        tracing::debug!("session runtime stopped");
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot());
    }

    /// Single-shot position query; denial resolves to the fallback.
    fn spawn_location_query(&self) {
        let location = self.services.location.clone();
        let fallback = self.services.fallback_location;
        let done = self.completions_tx.clone();
        let cancel = self.root.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                position = resolve_location(location.as_ref(), fallback) => {
                    let _ = done.send(SessionEvent::LocationUpdated(position));
                }
            }
        });
    }

    /// Returns `false` once the session asked to shut down.
    fn perform(&mut self, effects: Vec<Effect>) -> bool {
        for effect in effects {
            match effect {
                Effect::FetchRoute {
                    request,
                    origin,
                    destination,
                } => {
                    let router = self.services.router.clone();
                    let done = self.completions_tx.clone();
                    let cancel = self.root.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            result = router.route(origin, destination) => {
                                let _ = done.send(SessionEvent::RouteResolved { request, result });
                            }
                        }
                    });
                }
                Effect::FitViewport(viewport) => {
                    tracing::debug!("fitting map to corridor {}", viewport.key());
                }
                Effect::LocateStations { request, area } => {
                    let token = self.root.child_token();
                    self.station_tokens.insert(request, token.clone());
                    let locator = self.services.locator.clone();
                    let done = self.completions_tx.clone();
                    tokio::spawn(async move {
                        match locator.find_stations_cancellable(&area, &token).await {
                            Ok(stations) => {
                                let _ = done.send(SessionEvent::StationsResolved { request, stations });
                            }
                            Err(cancelled) => tracing::debug!("{cancelled} ({request:?})"),
                        }
                    });
                }
                Effect::CancelStations(request) => {
                    if let Some(token) = self.station_tokens.remove(&request) {
                        token.cancel();
                    }
                }
                Effect::Notify(message) => {
                    tracing::info!("notifying rider: {message}");
                }
                Effect::Shutdown => return false,
            }
        }
        true
    }
}
