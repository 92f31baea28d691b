use crate::types::weather_series::Variable;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranspositionError {
    #[error("Weather series '{key}' is empty")]
    EmptySeries { key: String },

    #[error("Weather series '{key}' lacks required variable {variable}")]
    MissingVariable { key: String, variable: Variable },

    #[error("Solar position failed at {time}: {message}")]
    SolarPosition {
        time: DateTime<Utc>,
        message: String,
    },

    #[error("Invalid site: {0}")]
    InvalidSite(String),
}
