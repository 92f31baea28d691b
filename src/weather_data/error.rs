use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherDataError {
    #[error("Unable to read forecast cache directory '{0}'")]
    CacheDirRead(PathBuf, #[source] std::io::Error),

    #[error("No forecast cache file for key '{key}' in '{dir}'")]
    CacheNotFound { key: String, dir: PathBuf },

    // Errors during CSV reading (inside blocking task)
    #[error("I/O error processing CSV data for '{source_name}'")]
    CsvReadIo {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parsing error processing CSV data for '{source_name}'")]
    CsvReadPolars {
        source_name: String,
        #[source]
        source: PolarsError,
    },

    #[error("Missing required column '{column}' in '{source_name}'")]
    MissingColumnError { source_name: String, column: String },

    #[error("Invalid value '{value}' in column '{column}' of '{source_name}'")]
    InvalidValue {
        source_name: String,
        column: String,
        value: String,
    },

    #[error("Invalid timestamp '{value}' in '{source_name}', expected format {format}")]
    InvalidTimestamp {
        source_name: String,
        value: String,
        format: String,
    },

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Data download failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to open zip archive downloaded from {url}")]
    ArchiveOpen {
        url: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("No member starting with '{prefix}' in archive {url}")]
    ArchiveMemberNotFound { url: String, prefix: String },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Weather series '{key}' has neither global nor direct and diffuse horizontal irradiance")]
    NoIrradiance { key: String },

    #[error("Temperature and irradiation archives for '{key}' do not overlap")]
    NoOverlap { key: String },
}
