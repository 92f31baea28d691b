//! Perez (1990) sky diffuse transposition plus the beam and ground reflected
//! plane-of-array components.

use crate::irradiance::solar_geometry::aoi_projection;
use crate::types::location::SystemGeometry;

/// Clearness (ε) bin lower edges.
const EPSILON_BINS: [f64; 8] = [0.0, 1.065, 1.23, 1.5, 1.95, 2.8, 4.5, 6.2];

// allsitescomposite1990
const F1: [[f64; 3]; 8] = [
    [-0.008, 0.588, -0.062],
    [0.130, 0.683, -0.151],
    [0.330, 0.487, -0.221],
    [0.568, 0.187, -0.295],
    [0.873, -0.392, -0.362],
    [1.132, -1.237, -0.412],
    [1.060, -1.600, -0.359],
    [0.678, -0.327, -0.250],
];
const F2: [[f64; 3]; 8] = [
    [-0.060, 0.072, -0.022],
    [-0.019, 0.066, -0.029],
    [0.055, -0.064, -0.026],
    [0.109, -0.152, -0.014],
    [0.226, -0.462, 0.001],
    [0.288, -0.823, 0.056],
    [0.264, -1.127, 0.131],
    [0.156, -1.377, 0.251],
];

const KAPPA: f64 = 1.041;

/// Sun and sky state for one sample. Angles in degrees, irradiance in W/m².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyConditions {
    pub zenith: f64,
    pub azimuth: f64,
    pub dni: f64,
    pub ghi: f64,
    pub dhi: f64,
    pub extra: f64,
    /// Absolute airmass, `NaN` with the sun below the horizon.
    pub airmass: f64,
}

/// Plane-of-array irradiance split by origin, in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoaComponents {
    pub beam: f64,
    pub sky_diffuse: f64,
    pub ground_diffuse: f64,
}

impl PoaComponents {
    pub fn global(&self) -> f64 {
        self.beam + self.sky_diffuse + self.ground_diffuse
    }
}

fn epsilon_bin(epsilon: f64) -> Option<usize> {
    if epsilon.is_nan() {
        return None;
    }
    EPSILON_BINS.iter().rposition(|edge| epsilon >= *edge)
}

/// Perez sky diffuse irradiance on a tilted surface.
///
/// Zero when the airmass is undefined or the sky clearness cannot be binned.
pub fn perez_sky_diffuse(system: &SystemGeometry, sky: &SkyConditions) -> f64 {
    if sky.airmass.is_nan() {
        return 0.0;
    }
    let z = sky.zenith.to_radians();
    let delta = sky.dhi * sky.airmass / sky.extra;
    let epsilon = ((sky.dhi + sky.dni) / sky.dhi + KAPPA * z.powi(3)) / (1.0 + KAPPA * z.powi(3));
    let Some(bin) = epsilon_bin(epsilon) else {
        return 0.0;
    };

    let f1 = (F1[bin][0] + F1[bin][1] * delta + F1[bin][2] * z).max(0.0);
    let f2 = F2[bin][0] + F2[bin][1] * delta + F2[bin][2] * z;

    let a = aoi_projection(system.tilt, system.azimuth, sky.zenith, sky.azimuth).max(0.0);
    let b = sky.zenith.to_radians().cos().max(85f64.to_radians().cos());
    let tilt = system.tilt.to_radians();

    let term1 = 0.5 * (1.0 - f1) * (1.0 + tilt.cos());
    let term2 = f1 * a / b;
    let term3 = f2 * tilt.sin();
    let sky_diffuse = (sky.dhi * (term1 + term2 + term3)).max(0.0);
    if sky_diffuse.is_finite() {
        sky_diffuse
    } else {
        0.0
    }
}

/// Beam irradiance on a tilted surface, never negative.
pub fn beam_component(system: &SystemGeometry, zenith: f64, azimuth: f64, dni: f64) -> f64 {
    (dni * aoi_projection(system.tilt, system.azimuth, zenith, azimuth)).max(0.0)
}

/// Isotropic ground reflected irradiance.
pub fn ground_diffuse(system: &SystemGeometry, ghi: f64) -> f64 {
    ghi * system.albedo * (1.0 - system.tilt.to_radians().cos()) * 0.5
}

/// All plane-of-array components for one sample.
pub fn poa_components(system: &SystemGeometry, sky: &SkyConditions) -> PoaComponents {
    PoaComponents {
        beam: beam_component(system, sky.zenith, sky.azimuth, sky.dni),
        sky_diffuse: perez_sky_diffuse(system, sky),
        ground_diffuse: ground_diffuse(system, sky.ghi),
    }
}
