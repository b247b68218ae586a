//! Source of the user's current position.

use async_trait::async_trait;

use crate::config::LocationConfig;
use crate::error::CompanionError;
use crate::proximity::GeoPoint;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// # Errors
    ///
    /// [`CompanionError::PermissionDenied`] when location access is refused,
    /// [`CompanionError::PositionUnavailable`] when no fix can be obtained.
    async fn current_location(&self) -> Result<GeoPoint, CompanionError>;
}

/// A location supplied up front (command-line flags or config) instead of a
/// positioning device.
#[derive(Debug, Clone)]
pub struct FixedLocation {
    point: Option<GeoPoint>,
    permission_granted: bool,
}

impl FixedLocation {
    pub fn new(point: Option<GeoPoint>, permission_granted: bool) -> Self {
        Self {
            point,
            permission_granted,
        }
    }

    /// Uses `cli_point` if given, else the configured coordinates.
    pub fn from_config(config: &LocationConfig, cli_point: Option<GeoPoint>) -> Self {
        Self::new(cli_point.or_else(|| config.point()), config.permission_granted)
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<GeoPoint, CompanionError> {
        if !self.permission_granted {
            return Err(CompanionError::PermissionDenied);
        }
        self.point.ok_or(CompanionError::PositionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let provider = FixedLocation::new(Some(GeoPoint::new(1.3, 103.8)), true);
        assert_eq!(
            provider.current_location().await.unwrap(),
            GeoPoint::new(1.3, 103.8)
        );
    }

    #[tokio::test]
    async fn test_permission_denied_wins() {
        let provider = FixedLocation::new(Some(GeoPoint::new(1.3, 103.8)), false);
        assert!(matches!(
            provider.current_location().await,
            Err(CompanionError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_missing_point_is_unavailable() {
        let provider = FixedLocation::new(None, true);
        assert!(matches!(
            provider.current_location().await,
            Err(CompanionError::PositionUnavailable)
        ));
    }

    #[test]
    fn test_cli_point_overrides_config() {
        let config = LocationConfig {
            latitude: Some(1.0),
            longitude: Some(103.0),
            permission_granted: true,
        };
        let provider = FixedLocation::from_config(&config, Some(GeoPoint::new(1.3, 103.8)));
        assert_eq!(provider.point, Some(GeoPoint::new(1.3, 103.8)));
    }
}
