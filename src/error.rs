use crate::grid::error::GridForecastError;
use crate::irradiance::error::TranspositionError;
use crate::weather_data::error::WeatherDataError;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum PvWeatherError {
    #[error(transparent)]
    Grid(#[from] GridForecastError),

    #[error(transparent)]
    WeatherData(#[from] WeatherDataError),

    #[error(transparent)]
    Transposition(#[from] TranspositionError),

    #[error("Method '{method}' is not valid for {operation}")]
    InvalidMethod {
        method: String,
        operation: &'static str,
    },

    #[error("Method '{0}' requires coordinates")]
    MissingCoordinates(String),

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("No grid decoder configured for GRIB2 forecasts")]
    MissingDecoder,

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),

    #[error("Background task failed")]
    TaskJoin(#[from] JoinError),
}
