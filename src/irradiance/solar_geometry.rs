//! Solar position, extraterrestrial radiation and angle-of-incidence helpers.

use crate::irradiance::error::TranspositionError;
use chrono::{DateTime, Datelike, Utc};
use solar_positioning::{spa, RefractionCorrection};
use std::f64::consts::PI;

/// ΔT (TT − UT) in seconds used for every solar position.
pub const DELTA_T: f64 = 67.0;
/// Air temperature in °C assumed for the refraction correction.
pub const REFRACTION_TEMPERATURE: f64 = 12.0;

pub const SOLAR_CONSTANT: f64 = 1366.1;

/// Sun angles for one instant, all in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarAngles {
    /// Zenith corrected for atmospheric refraction.
    pub apparent_zenith: f64,
    /// Geometric zenith.
    pub zenith: f64,
    /// Geometric elevation, `90 - zenith`.
    pub elevation: f64,
    /// Clockwise from north.
    pub azimuth: f64,
}

/// Computes the SPA sun position at `time` for a site at `altitude` meters,
/// with refraction evaluated at `pressure` Pa.
pub fn solar_angles(
    time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    pressure: f64,
) -> Result<SolarAngles, TranspositionError> {
    let failed = |message: String| TranspositionError::SolarPosition { time, message };

    let refraction = RefractionCorrection::new(pressure / 100.0, REFRACTION_TEMPERATURE)
        .map_err(|e| failed(e.to_string()))?;
    let apparent = spa::solar_position(time, latitude, longitude, altitude, DELTA_T, Some(refraction))
        .map_err(|e| failed(e.to_string()))?;
    let geometric = spa::solar_position(time, latitude, longitude, altitude, DELTA_T, None)
        .map_err(|e| failed(e.to_string()))?;

    Ok(SolarAngles {
        apparent_zenith: apparent.zenith_angle(),
        zenith: geometric.zenith_angle(),
        elevation: geometric.elevation_angle(),
        azimuth: geometric.azimuth(),
    })
}

/// Spencer (1971) extraterrestrial normal irradiance in W/m² for a UTC day of year.
pub fn extra_radiation(time: DateTime<Utc>, solar_constant: f64) -> f64 {
    let day_angle = 2.0 * PI / 365.0 * (time.ordinal() as f64 - 1.0);
    let ratio = 1.00011
        + 0.034221 * day_angle.cos()
        + 0.00128 * day_angle.sin()
        + 0.000719 * (2.0 * day_angle).cos()
        + 0.000077 * (2.0 * day_angle).sin();
    solar_constant * ratio
}

/// Cosine of the angle of incidence of beam radiation on a tilted surface,
/// clipped to `[-1, 1]`.
pub fn aoi_projection(
    surface_tilt: f64,
    surface_azimuth: f64,
    solar_zenith: f64,
    solar_azimuth: f64,
) -> f64 {
    let tilt = surface_tilt.to_radians();
    let zenith = solar_zenith.to_radians();
    let projection = tilt.cos() * zenith.cos()
        + tilt.sin() * zenith.sin() * (solar_azimuth - surface_azimuth).to_radians().cos();
    projection.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_noon_sun_is_high_in_summer() -> Result<(), TranspositionError> {
        // Ulm, close to local solar noon on the June solstice
        let noon = Utc.with_ymd_and_hms(2024, 6, 21, 11, 20, 0).unwrap();
        let angles = solar_angles(noon, 48.40, 9.99, 480.0, 95_000.0)?;
        dbg!(&angles);

        assert!((angles.zenith - (48.40 - 23.44)).abs() < 0.5);
        assert!(angles.apparent_zenith <= angles.zenith);
        assert!((angles.elevation + angles.zenith - 90.0).abs() < 1e-9);
        assert!((angles.azimuth - 180.0).abs() < 10.0);
        Ok(())
    }

    #[test]
    fn test_extra_radiation_perihelion_and_aphelion() {
        let january = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let july = Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap();
        let jan = extra_radiation(january, SOLAR_CONSTANT);
        let jul = extra_radiation(july, SOLAR_CONSTANT);
        assert!(jan > 1400.0 && jan < 1420.0, "{jan}");
        assert!(jul > 1315.0 && jul < 1330.0, "{jul}");
    }

    #[test]
    fn test_aoi_projection() {
        // flat surface: cosine of zenith
        assert!((aoi_projection(0.0, 180.0, 60.0, 90.0) - 0.5).abs() < 1e-12);
        // surface facing the sun
        assert!((aoi_projection(40.0, 180.0, 40.0, 180.0) - 1.0).abs() < 1e-12);
        // sun behind a vertical surface
        assert!(aoi_projection(90.0, 180.0, 45.0, 0.0) < 0.0);
    }
}
