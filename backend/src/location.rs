use async_trait::async_trait;
use shared::Coordinate;

use crate::error::LocationError;

/// Single-shot "current position" query against the device.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, LocationError>;
}

/// Reports a configured position, or behaves like a denied permission.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Option<Coordinate>);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinate, LocationError> {
        self.0.ok_or(LocationError::PermissionDenied)
    }
}

/// Current position, or `fallback` when the device cannot tell. Never blocks
/// the flow on a geolocation failure.
pub async fn resolve_location(provider: &dyn LocationProvider, fallback: Coordinate) -> Coordinate {
    match provider.current_position().await {
        Ok(position) => position,
        Err(err) => {
            tracing::warn!("{err}, using fallback location {}", fallback.key());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FALLBACK_LOCATION;

    struct BrokenGps;

    #[async_trait]
    impl LocationProvider for BrokenGps {
        async fn current_position(&self) -> Result<Coordinate, LocationError> {
            Err(LocationError::Unavailable("no fix".into()))
        }
    }

    #[tokio::test]
    async fn reported_position_wins() {
        let porto = Coordinate::new(41.1579, -8.6291);
        let resolved = resolve_location(&FixedLocation(Some(porto)), FALLBACK_LOCATION).await;
        assert_eq!(resolved, porto);
    }

    #[tokio::test]
    async fn denied_permission_uses_fallback() {
        let resolved = resolve_location(&FixedLocation(None), FALLBACK_LOCATION).await;
        assert_eq!(resolved, FALLBACK_LOCATION);
    }

    #[tokio::test]
    async fn device_error_uses_fallback() {
        assert_eq!(
            resolve_location(&BrokenGps, FALLBACK_LOCATION).await,
            FALLBACK_LOCATION
        );
    }
}
