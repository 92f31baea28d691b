//! Reads the public hourly station archives (air temperature and solar irradiation).

use crate::types::weather_series::{Variable, WeatherRecord, WeatherSeries};
use crate::weather_data::data_loader::{
    csv_to_dataframe, extract_member, parse_value, string_column, ArchiveFetcher,
};
use crate::weather_data::error::WeatherDataError;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sentinel for a missing observation in the archives.
pub const MISSING_SENTINEL: f64 = -999.0;

/// Hourly J/cm² to mean W/m².
pub fn joules_per_cm2_to_watts(value: f64) -> f64 {
    value * 100f64.powi(2) / 3600.0
}

/// Where the archives live and how their members and columns are named.
///
/// URL templates contain a `{key}` placeholder for the station key.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSource {
    pub temperature_url: String,
    pub irradiation_url: String,
    pub temperature_member_prefix: String,
    pub irradiation_member_prefix: String,
    pub time_column: String,
    pub temperature_column: String,
    pub global_column: String,
    pub diffuse_column: String,
    pub temperature_time_format: String,
    pub irradiation_time_format: String,
    /// Irradiation is stamped at the interval center; shifting by this amount
    /// labels each value with the start of its hour.
    pub irradiation_shift: Duration,
}

impl Default for ArchiveSource {
    fn default() -> Self {
        const BASE: &str =
            "https://opendata.dwd.de/climate_environment/CDC/observations_germany/climate/hourly";
        Self {
            temperature_url: format!("{BASE}/air_temperature/recent/stundenwerte_TU_{{key}}_akt.zip"),
            irradiation_url: format!("{BASE}/solar/stundenwerte_ST_{{key}}.zip"),
            temperature_member_prefix: "produkt_temp_Terminwerte_".to_string(),
            irradiation_member_prefix: "produkt_strahlung_Stundenwerte_".to_string(),
            time_column: "MESS_DATUM".to_string(),
            temperature_column: "LUFTTEMPERATUR".to_string(),
            global_column: "GLOBAL_KW_J".to_string(),
            diffuse_column: "DIFFUS_HIMMEL_KW_J".to_string(),
            temperature_time_format: "%Y%m%d%H".to_string(),
            irradiation_time_format: "%Y%m%d%H:%M".to_string(),
            irradiation_shift: Duration::minutes(30),
        }
    }
}

impl ArchiveSource {
    fn url(template: &str, key: &str) -> String {
        template.replace("{key}", key)
    }
}

/// Parses a UTC timestamp, accepting formats without a minute field.
fn parse_utc(raw: &str, format: &str, source_name: &str) -> Result<DateTime<Utc>, WeatherDataError> {
    let raw = raw.trim();
    let parsed = if format.contains("%M") {
        NaiveDateTime::parse_from_str(raw, format)
    } else {
        NaiveDateTime::parse_from_str(&format!("{raw}:00"), &format!("{format}:%M"))
    };
    parsed
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| WeatherDataError::InvalidTimestamp {
            source_name: source_name.to_string(),
            value: raw.to_string(),
            format: format.to_string(),
        })
}

pub struct PublicArchiveReader {
    source: ArchiveSource,
    fetcher: Arc<dyn ArchiveFetcher>,
}

impl PublicArchiveReader {
    pub fn new(source: ArchiveSource, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        Self { source, fetcher }
    }

    async fn fetch_member(&self, url: &str, prefix: &str) -> Result<Vec<u8>, WeatherDataError> {
        let bytes = self.fetcher.fetch(url).await?;
        extract_member(&bytes, prefix, url)
    }

    async fn read_temperature(
        &self,
        key: &str,
    ) -> Result<BTreeMap<DateTime<Utc>, Option<f64>>, WeatherDataError> {
        let url = ArchiveSource::url(&self.source.temperature_url, key);
        let member = self
            .fetch_member(&url, &self.source.temperature_member_prefix)
            .await?;
        let df = csv_to_dataframe(member, b';', &url).await?;

        let times = string_column(&df, &self.source.time_column, &url)?;
        let values = string_column(&df, &self.source.temperature_column, &url)?;
        let mut series = BTreeMap::new();
        for (time, value) in times.into_iter().zip(values.into_iter()) {
            let Some(time) = time else { continue };
            let time = parse_utc(time, &self.source.temperature_time_format, &url)?;
            let value = parse_value(
                value,
                Some(MISSING_SENTINEL),
                &self.source.temperature_column,
                &url,
            )?;
            series.insert(time, value);
        }
        Ok(series)
    }

    async fn read_irradiation(
        &self,
        key: &str,
    ) -> Result<BTreeMap<DateTime<Utc>, (Option<f64>, Option<f64>)>, WeatherDataError> {
        let url = ArchiveSource::url(&self.source.irradiation_url, key);
        let member = self
            .fetch_member(&url, &self.source.irradiation_member_prefix)
            .await?;
        let df = csv_to_dataframe(member, b';', &url).await?;

        let times = string_column(&df, &self.source.time_column, &url)?;
        let global = string_column(&df, &self.source.global_column, &url)?;
        let diffuse = string_column(&df, &self.source.diffuse_column, &url)?;
        let mut series = BTreeMap::new();
        for row in 0..df.height() {
            let Some(time) = times.get(row) else { continue };
            let time = parse_utc(time, &self.source.irradiation_time_format, &url)?
                - self.source.irradiation_shift;
            let ghi = parse_value(
                global.get(row),
                Some(MISSING_SENTINEL),
                &self.source.global_column,
                &url,
            )?
            .map(joules_per_cm2_to_watts);
            let dhi = parse_value(
                diffuse.get(row),
                Some(MISSING_SENTINEL),
                &self.source.diffuse_column,
                &url,
            )?
            .map(joules_per_cm2_to_watts);
            series.insert(time, (ghi, dhi));
        }
        Ok(series)
    }

    /// Downloads both archives for station `key` and merges them.
    ///
    /// Rows outside the window shared by both archives are dropped. The result
    /// carries global and diffuse horizontal irradiance and temperature.
    pub async fn read(&self, key: &str, timezone: Tz) -> Result<WeatherSeries, WeatherDataError> {
        let temperature = self.read_temperature(key).await?;
        let irradiation = self.read_irradiation(key).await?;

        let (Some(temp_start), Some(temp_end), Some(irr_start), Some(irr_end)) = (
            temperature.keys().next().copied(),
            temperature.keys().next_back().copied(),
            irradiation.keys().next().copied(),
            irradiation.keys().next_back().copied(),
        ) else {
            warn!("Archive for station {} is empty", key);
            return Err(WeatherDataError::NoOverlap {
                key: key.to_string(),
            });
        };
        let start = temp_start.max(irr_start);
        let end = temp_end.min(irr_end);
        if start > end {
            return Err(WeatherDataError::NoOverlap {
                key: key.to_string(),
            });
        }

        let mut rows: BTreeMap<DateTime<Utc>, WeatherRecord> = BTreeMap::new();
        for (time, value) in temperature.range(start..=end) {
            rows.entry(*time)
                .or_insert_with(|| WeatherRecord::empty(time.with_timezone(&timezone)))
                .temperature = *value;
        }
        for (time, (ghi, dhi)) in irradiation.range(start..=end) {
            let record = rows
                .entry(*time)
                .or_insert_with(|| WeatherRecord::empty(time.with_timezone(&timezone)));
            record.global_horizontal = *ghi;
            record.diffuse_horizontal = *dhi;
        }
        info!(
            "Merged {} archive rows for station {} between {} and {}",
            rows.len(),
            key,
            start,
            end
        );

        WeatherSeries::new(
            key,
            timezone,
            [
                Variable::GlobalHorizontal,
                Variable::DiffuseHorizontal,
                Variable::Temperature,
            ],
            rows.into_values().collect(),
        )
    }
}
