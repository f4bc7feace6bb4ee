use std::time::Duration;

use thiserror::Error;

/// Failure talking to one upstream HTTP provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed provider payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("provider payload is missing `{0}`")]
    Incomplete(&'static str),
    #[error("no answer within {0:?}")]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing provider returned no route")]
    NoRoute,
    #[error("routing provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl RoutingError {
    /// Short message shown to the rider; details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        "Could not draw the route."
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("geolocation permission denied")]
    PermissionDenied,
    #[error("geolocation unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("no path to export")]
    EmptyPath,
}
