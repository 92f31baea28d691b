//! The main entry point: retrieves forecast or reference weather for a PV site and
//! transposes it onto the PV surface.

use crate::error::PvWeatherError;
use crate::grid::decoder::GridDecoder;
use crate::grid::reader::{GridForecastReader, GridRunConfig, GridRunOutcome};
use crate::irradiance::engine::transpose;
use crate::types::into_utc_trait::IntoUtcDateTime;
use crate::types::irradiation::HourlyIrradiation;
use crate::types::location::{LatLon, Location, SystemGeometry};
use crate::types::method::RetrievalMethod;
use crate::types::weather_series::WeatherSeries;
use crate::utils::{ensure_data_dir_exists, get_data_dir};
use crate::weather_data::archive_reader::{ArchiveSource, PublicArchiveReader};
use crate::weather_data::cache_reader::read_cache_csv;
use crate::weather_data::cache_selector::select_nearest_cache;
use crate::weather_data::data_loader::{ArchiveFetcher, ReqwestArchiveFetcher};
use bon::bon;
use chrono_tz::Tz;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

/// Key of the cached forecast files when none is given.
pub const DEFAULT_FORECAST_KEY: &str = "DWD";

/// The client for weather retrieval and irradiance transposition.
///
/// Forecast data lives below a data directory: GRIB2 runs in `<data>/dwd/<field>/`,
/// converted forecasts in `<data>/csv/`. Create an instance with [`PvWeather::new()`]
/// for the default directory or [`PvWeather::with_data_folder()`] for a custom one.
///
/// # Examples
///
/// ```rust,no_run
/// # use pvweather::{PvWeather, PvWeatherError, RetrievalMethod};
/// # use chrono::NaiveDate;
/// # async fn run() -> Result<(), PvWeatherError> {
/// let client = PvWeather::new().await?;
/// let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
/// let series = client
///     .forecast()
///     .date(date)
///     .timezone(chrono_tz::Europe::Berlin)
///     .method(RetrievalMethod::DwdCsv)
///     .call()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PvWeather {
    data_dir: PathBuf,
    grid_decoder: Option<Arc<dyn GridDecoder>>,
    grid_config: GridRunConfig,
    archive_reader: PublicArchiveReader,
}

#[bon]
impl PvWeather {
    /// Creates a client that keeps its data in `data_folder`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PvWeatherError::DataDirCreation`] if the directory cannot be created.
    pub async fn with_data_folder(data_folder: PathBuf) -> Result<Self, PvWeatherError> {
        ensure_data_dir_exists(&data_folder)
            .await
            .map_err(|e| PvWeatherError::DataDirCreation(data_folder.clone(), e))?;
        Ok(Self {
            data_dir: data_folder,
            grid_decoder: None,
            grid_config: GridRunConfig::default(),
            archive_reader: PublicArchiveReader::new(
                ArchiveSource::default(),
                Arc::new(ReqwestArchiveFetcher::new()),
            ),
        })
    }

    /// Creates a client using the platform cache directory (e.g. `~/.cache/pvweather`).
    ///
    /// # Errors
    ///
    /// Returns [`PvWeatherError::DataDirResolution`] if there is no cache directory,
    /// [`PvWeatherError::DataDirCreation`] if it cannot be created.
    pub async fn new() -> Result<Self, PvWeatherError> {
        let data_folder = get_data_dir().map_err(PvWeatherError::DataDirResolution)?;
        Self::with_data_folder(data_folder).await
    }

    /// Sets the decoder used for [`RetrievalMethod::DwdGrib2`] forecasts.
    pub fn with_grid_decoder(mut self, decoder: Arc<dyn GridDecoder>) -> Self {
        self.grid_decoder = Some(decoder);
        self
    }

    pub fn with_grid_config(mut self, config: GridRunConfig) -> Self {
        self.grid_config = config;
        self
    }

    /// Replaces where and how the public station archives are fetched.
    pub fn with_archive(mut self, source: ArchiveSource, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.archive_reader = PublicArchiveReader::new(source, fetcher);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Retrieves the forecast closest to `date`.
    ///
    /// * [`RetrievalMethod::DwdCsv`] reads the cached forecast file whose issue time is
    ///   nearest to `date`.
    /// * [`RetrievalMethod::DwdGrib2`] first converts the latest complete GRIB2 run at
    ///   `location` into the cache, then reads the cache the same way.
    ///
    /// `key` selects the cache files (`<key>_<YYYYMMDDHH>.csv`) and defaults to
    /// [`DEFAULT_FORECAST_KEY`]. Naive dates are interpreted in `timezone`.
    ///
    /// # Errors
    ///
    /// Returns [`PvWeatherError::InvalidMethod`] for a reference method,
    /// [`PvWeatherError::MissingCoordinates`] for GRIB2 without `location` and
    /// [`PvWeatherError::MissingDecoder`] when no grid decoder is configured. These
    /// are raised before touching the filesystem.
    #[builder]
    pub async fn forecast<D: IntoUtcDateTime>(
        &self,
        date: D,
        timezone: Tz,
        method: RetrievalMethod,
        location: Option<LatLon>,
        key: Option<&str>,
    ) -> Result<WeatherSeries, PvWeatherError> {
        if !method.is_forecast() {
            return Err(PvWeatherError::InvalidMethod {
                method: method.to_string(),
                operation: "forecast",
            });
        }
        let key = key.unwrap_or(DEFAULT_FORECAST_KEY);
        let target = date.into_utc(&timezone);

        if method == RetrievalMethod::DwdGrib2 {
            let location =
                location.ok_or_else(|| PvWeatherError::MissingCoordinates(method.to_string()))?;
            let decoder = self
                .grid_decoder
                .clone()
                .ok_or(PvWeatherError::MissingDecoder)?;
            let reader =
                GridForecastReader::with_config(&self.data_dir, decoder, self.grid_config.clone());
            match reader.convert_latest(key, location).await? {
                GridRunOutcome::Produced(path) => info!("Converted forecast run into {:?}", path),
                outcome => info!("No forecast conversion ({:?}), using existing cache", outcome),
            }
        }

        let cache_dir = self.data_dir.join("csv");
        let path = select_nearest_cache(&cache_dir, key, &target).await?;
        info!("Reading forecast {:?} for {}", path, target);
        Ok(read_cache_csv(&path, timezone).await?)
    }

    /// Retrieves measured reference weather for the station `key`.
    ///
    /// The public archives are downloaded whole; `date` is only used for logging and
    /// the returned series covers the full overlap of both archives. Use
    /// [`WeatherSeries::between`] to narrow it down.
    ///
    /// # Errors
    ///
    /// Returns [`PvWeatherError::InvalidMethod`] for a forecast method, before any
    /// download starts.
    #[builder]
    pub async fn reference<D: IntoUtcDateTime>(
        &self,
        date: D,
        timezone: Tz,
        key: &str,
        method: RetrievalMethod,
    ) -> Result<WeatherSeries, PvWeatherError> {
        if !method.is_reference() {
            return Err(PvWeatherError::InvalidMethod {
                method: method.to_string(),
                operation: "reference",
            });
        }
        info!(
            "Reading reference weather for station {} around {}",
            key,
            date.into_utc(&timezone)
        );
        Ok(self.archive_reader.read(key, timezone).await?)
    }

    /// Computes hourly plane-of-array irradiance for `series` on a background thread.
    ///
    /// See [`transpose`] for the computation and its errors.
    pub async fn irradiation(
        &self,
        series: &WeatherSeries,
        system: &SystemGeometry,
        location: &Location,
    ) -> Result<HourlyIrradiation, PvWeatherError> {
        let series = series.clone();
        let system = *system;
        let location = location.clone();
        let hourly = task::spawn_blocking(move || transpose(&series, &system, &location)).await??;
        Ok(hourly)
    }
}
