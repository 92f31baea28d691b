use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridForecastError {
    #[error("Failed to list forecast directory '{0}'")]
    DirectoryRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to create directory '{0}'")]
    DirectoryCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to create temporary directory for decompressed runs")]
    TempDirCreation(#[source] std::io::Error),

    #[error("Failed to decompress forecast file '{0}'")]
    Decompression(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode GRIB2 file '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    #[error("GRIB2 file '{path}' holds no value for field {field} at the selected cell")]
    MissingValue { path: PathBuf, field: String },

    #[error("I/O error writing forecast cache file '{0}'")]
    CsvWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing forecast cache file '{0}'")]
    CsvWritePolars(PathBuf, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
