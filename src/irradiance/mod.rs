pub mod atmosphere;
pub mod decomposition;
mod dirint_coefficients;
pub mod engine;
pub mod error;
pub mod perez;
pub mod resample;
pub mod solar_geometry;
