//! Device position lookup.

use crate::models::Location;

/// Why the device position could not be determined. All of these are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("Could not get your location. Please allow location access in your settings.")]
    PermissionDenied,
    #[error("Could not get your location. Location information is unavailable.")]
    PositionUnavailable,
    #[error("Could not get your location. Location request timed out.")]
    Timeout,
    #[error("Geolocation is not supported on this device.")]
    Unsupported,
}

/// Source of the device's current position.
pub trait Geolocator {
    fn current_position(&self) -> Result<Location, GeolocationError>;
}

/// Reports a position fixed by configuration, or unavailability when none is set.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredGeolocator {
    position: Option<Location>,
}

impl ConfiguredGeolocator {
    pub fn new(position: Option<Location>) -> Self {
        Self { position }
    }
}

impl Geolocator for ConfiguredGeolocator {
    fn current_position(&self) -> Result<Location, GeolocationError> {
        self.position.ok_or(GeolocationError::PositionUnavailable)
    }
}
