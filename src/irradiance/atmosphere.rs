//! Pressure and airmass models.

/// Standard sea level pressure in Pa.
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;

/// Estimates atmospheric pressure in Pa from altitude in meters (standard atmosphere).
pub fn altitude_to_pressure(altitude: f64) -> f64 {
    100.0 * ((44331.514 - altitude) / 11880.516).powf(1.0 / 0.1902632)
}

/// Kasten & Young (1989) relative airmass. `NaN` for zenith angles beyond 90°.
pub fn relative_airmass_kasten_young(zenith: f64) -> f64 {
    if zenith > 90.0 || zenith.is_nan() {
        return f64::NAN;
    }
    1.0 / (zenith.to_radians().cos() + 0.50572 * (6.07995 + (90.0 - zenith)).powf(-1.6364))
}

/// Kasten (1966) relative airmass. `NaN` for zenith angles beyond 90°.
pub fn relative_airmass_kasten(zenith: f64) -> f64 {
    if zenith > 90.0 || zenith.is_nan() {
        return f64::NAN;
    }
    1.0 / (zenith.to_radians().cos() + 0.15 * (93.885 - zenith).powf(-1.253))
}

/// Scales a relative airmass to the site pressure (Pa).
pub fn absolute_airmass(relative: f64, pressure: f64) -> f64 {
    relative * pressure / SEA_LEVEL_PRESSURE
}
