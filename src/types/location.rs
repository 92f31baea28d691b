//! Geographic and PV-system descriptors shared by the readers and the transposition engine.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1),
/// both in decimal degrees.
///
/// # Examples
///
/// ```
/// use pvweather::LatLon;
///
/// let ulm = LatLon(48.40, 9.99);
/// assert_eq!(ulm.0, 48.40); // Latitude
/// assert_eq!(ulm.1, 9.99); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

/// The site a weather series or an irradiation series belongs to.
///
/// `altitude` is in meters above sea level and drives the pressure estimate used
/// for solar position and airmass. `timezone` is the zone the hourly output is
/// localized to.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timezone: Tz,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timezone: Tz) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timezone,
        }
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }
}

/// Orientation of a PV array.
///
/// * `tilt` - degrees from horizontal (0 = flat, 90 = vertical).
/// * `azimuth` - degrees clockwise from north (180 = south facing).
/// * `albedo` - ground reflectance, between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemGeometry {
    pub tilt: f64,
    pub azimuth: f64,
    pub albedo: f64,
}

impl SystemGeometry {
    pub fn new(tilt: f64, azimuth: f64, albedo: f64) -> Self {
        Self {
            tilt,
            azimuth,
            albedo,
        }
    }
}

impl Default for SystemGeometry {
    /// A south facing array at 30° over grass.
    fn default() -> Self {
        Self::new(30.0, 180.0, 0.2)
    }
}
