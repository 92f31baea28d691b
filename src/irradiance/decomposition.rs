//! Global-to-direct decomposition: DISC (Maxwell 1987) and its DIRINT refinement
//! (Perez et al. 1992).
//!
//! Undefined intermediate values are carried as `NaN`, matching how the transposition
//! step treats them as zero contribution.

use crate::irradiance::atmosphere::{absolute_airmass, relative_airmass_kasten};
use crate::irradiance::dirint_coefficients::DIRINT_COEFFICIENTS;
use crate::irradiance::solar_geometry::extra_radiation;
use chrono::{DateTime, Utc};

/// Solar constant the DISC model was fitted with.
const DISC_SOLAR_CONSTANT: f64 = 1370.0;
const MIN_COS_ZENITH: f64 = 0.065;
const MAX_ZENITH: f64 = 87.0;
const MAX_AIRMASS: f64 = 12.0;

/// Precipitable water is unknown; selects the last w column.
const UNKNOWN_WATER_BIN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscOutput {
    /// Direct normal irradiance in W/m².
    pub dni: f64,
    /// Clearness index.
    pub kt: f64,
    /// Pressure corrected airmass, capped at 12.
    pub airmass: f64,
}

/// Ratio of global horizontal to extraterrestrial horizontal irradiance, within `[0, 1]`.
pub fn clearness_index(ghi: f64, zenith: f64, extra: f64) -> f64 {
    let horizontal_extra = extra * zenith.to_radians().cos().max(MIN_COS_ZENITH);
    (ghi / horizontal_extra).clamp(0.0, 1.0)
}

/// Airmass independent clearness index, within `[0, 1]`.
pub fn clearness_index_zenith_independent(kt: f64, airmass: f64) -> f64 {
    let factor = 1.031 * (-1.4 / (0.9 + 9.4 / airmass)).exp() + 0.1;
    (kt / factor).clamp(0.0, 1.0)
}

/// DISC direct normal irradiance from global horizontal irradiance.
///
/// `zenith` in degrees, `pressure` in Pa.
pub fn disc(ghi: f64, zenith: f64, time: DateTime<Utc>, pressure: f64) -> DiscOutput {
    let extra = extra_radiation(time, DISC_SOLAR_CONSTANT);
    let kt = clearness_index(ghi, zenith, extra);
    let airmass = absolute_airmass(relative_airmass_kasten(zenith), pressure).min(MAX_AIRMASS);

    let (a, b, c) = if kt <= 0.6 {
        (
            0.512 - 1.56 * kt + 2.286 * kt.powi(2) - 2.222 * kt.powi(3),
            0.37 + 0.962 * kt,
            -0.28 + 0.932 * kt - 2.048 * kt.powi(2),
        )
    } else {
        (
            -5.743 + 21.77 * kt - 27.49 * kt.powi(2) + 11.56 * kt.powi(3),
            41.4 - 118.5 * kt + 66.05 * kt.powi(2) + 31.9 * kt.powi(3),
            -47.01 + 184.2 * kt - 222.0 * kt.powi(2) + 73.81 * kt.powi(3),
        )
    };
    let delta_kn = a + b * (c * airmass).exp();
    let knc = 0.866 - 0.122 * airmass + 0.0121 * airmass.powi(2) - 0.000653 * airmass.powi(3)
        + 0.000014 * airmass.powi(4);
    let mut dni = (knc - delta_kn) * extra;

    if zenith > MAX_ZENITH || ghi < 0.0 || dni < 0.0 {
        dni = 0.0;
    }
    DiscOutput { dni, kt, airmass }
}

/// Stability index Δkt' for each sample of a kt' sequence.
///
/// Uses the mean absolute difference to both neighbours; at the ends the single
/// neighbour counts twice. A `NaN` neighbour contributes nothing unless both are `NaN`.
pub fn delta_kt_prime(kt_prime: &[f64]) -> Vec<f64> {
    let n = kt_prime.len();
    (0..n)
        .map(|i| {
            let next = if i + 1 < n {
                kt_prime[i + 1]
            } else if n > 1 {
                kt_prime[i - 1]
            } else {
                f64::NAN
            };
            let previous = if i > 0 {
                kt_prime[i - 1]
            } else if n > 1 {
                kt_prime[1]
            } else {
                f64::NAN
            };
            let to_next = (kt_prime[i] - next).abs();
            let to_previous = (kt_prime[i] - previous).abs();
            match (to_next.is_nan(), to_previous.is_nan()) {
                (true, true) => f64::NAN,
                (true, false) => 0.5 * to_previous,
                (false, true) => 0.5 * to_next,
                (false, false) => 0.5 * (to_next + to_previous),
            }
        })
        .collect()
}

fn kt_prime_bin(kt_prime: f64) -> Option<usize> {
    match kt_prime {
        k if (0.0..0.24).contains(&k) => Some(0),
        k if (0.24..0.4).contains(&k) => Some(1),
        k if (0.4..0.56).contains(&k) => Some(2),
        k if (0.56..0.7).contains(&k) => Some(3),
        k if (0.7..0.8).contains(&k) => Some(4),
        k if (0.8..=1.0).contains(&k) => Some(5),
        _ => None,
    }
}

fn zenith_bin(zenith: f64) -> Option<usize> {
    match zenith {
        z if (0.0..25.0).contains(&z) => Some(0),
        z if (25.0..40.0).contains(&z) => Some(1),
        z if (40.0..55.0).contains(&z) => Some(2),
        z if (55.0..70.0).contains(&z) => Some(3),
        z if (70.0..80.0).contains(&z) => Some(4),
        z if z >= 80.0 => Some(5),
        _ => None,
    }
}

fn delta_kt_prime_bin(delta: f64) -> Option<usize> {
    match delta {
        d if (0.0..0.015).contains(&d) => Some(0),
        d if (0.015..0.035).contains(&d) => Some(1),
        d if (0.035..0.07).contains(&d) => Some(2),
        d if (0.07..0.15).contains(&d) => Some(3),
        d if (0.15..0.3).contains(&d) => Some(4),
        d if (0.3..=1.0).contains(&d) => Some(5),
        _ => None,
    }
}

/// DIRINT correction factor, `NaN` when any input falls outside its bins.
pub fn dirint_coefficient(kt_prime: f64, zenith: f64, delta_kt_prime: f64) -> f64 {
    match (
        kt_prime_bin(kt_prime),
        zenith_bin(zenith),
        delta_kt_prime_bin(delta_kt_prime),
    ) {
        (Some(k), Some(z), Some(d)) => DIRINT_COEFFICIENTS[k][z][d][UNKNOWN_WATER_BIN],
        _ => f64::NAN,
    }
}

/// DIRINT direct normal irradiance for a contiguous sequence of samples.
///
/// Neighbouring samples feed the Δkt' stability index, so the slices must be in time
/// order and only contain the samples that are meant to be neighbours.
pub fn dirint(ghi: &[f64], zenith: &[f64], times: &[DateTime<Utc>], pressure: f64) -> Vec<f64> {
    let discs: Vec<DiscOutput> = ghi
        .iter()
        .zip(zenith)
        .zip(times)
        .map(|((g, z), t)| disc(*g, *z, *t, pressure))
        .collect();
    let kt_prime: Vec<f64> = discs
        .iter()
        .map(|d| clearness_index_zenith_independent(d.kt, d.airmass))
        .collect();
    let delta = delta_kt_prime(&kt_prime);

    discs
        .iter()
        .zip(&kt_prime)
        .zip(delta.iter().zip(zenith))
        .map(|((d, k), (dk, z))| d.dni * dirint_coefficient(*k, *z, *dk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 21, 11, 20, 0).unwrap()
    }

    #[test]
    fn test_clearness_index_bounds() {
        assert_eq!(clearness_index(-10.0, 30.0, 1370.0), 0.0);
        assert_eq!(clearness_index(5000.0, 30.0, 1370.0), 1.0);
        let kt = clearness_index(600.0, 60.0, 1200.0);
        assert!((kt - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disc_clear_sky() {
        let out = disc(850.0, 25.0, noon(), 101_325.0);
        dbg!(&out);
        assert!(out.kt > 0.6);
        assert!(out.dni > 500.0 && out.dni < 900.0, "{}", out.dni);
        assert!((out.airmass - 1.10).abs() < 0.02);
    }

    #[test]
    fn test_disc_rejects_low_sun_and_negative_ghi() {
        assert_eq!(disc(50.0, 88.0, noon(), 101_325.0).dni, 0.0);
        assert_eq!(disc(-1.0, 30.0, noon(), 101_325.0).dni, 0.0);
    }

    #[test]
    fn test_delta_kt_prime_edges() {
        let delta = delta_kt_prime(&[0.5, 0.7, 0.6]);
        // ends use their only neighbour twice
        assert!((delta[0] - 0.2).abs() < 1e-12);
        assert!((delta[1] - 0.15).abs() < 1e-12);
        assert!((delta[2] - 0.1).abs() < 1e-12);

        let gaps = delta_kt_prime(&[0.5, f64::NAN, 0.6]);
        assert!(gaps[0].is_nan());
        assert!(gaps[1].is_nan());
        assert!(delta_kt_prime(&[0.5])[0].is_nan());
    }

    #[test]
    fn test_dirint_coefficient_lookup() {
        // first kt' bin, first zenith bin, first Δkt' row, unknown water column
        assert_eq!(dirint_coefficient(0.1, 10.0, 0.01), 0.317440);
        assert!(dirint_coefficient(1.2, 10.0, 0.01).is_nan());
        assert!(dirint_coefficient(0.5, 10.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_dirint_tracks_disc() {
        let times: Vec<_> = (0..5).map(|m| noon() + Duration::minutes(m)).collect();
        let ghi = [840.0, 845.0, 850.0, 848.0, 846.0];
        let zenith = [25.0; 5];
        let dni = dirint(&ghi, &zenith, &times, 101_325.0);
        for (value, t) in dni.iter().zip(&times) {
            let reference = disc(850.0, 25.0, *t, 101_325.0).dni;
            assert!(value.is_finite());
            assert!((value - reference).abs() < 0.5 * reference, "{value} vs {reference}");
        }
    }
}
