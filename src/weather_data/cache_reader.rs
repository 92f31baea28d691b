//! Reads the normalized forecast cache CSV (`time,aswdifd_s,aswdir_s,t_2m,t_g`).

use crate::types::weather_series::{Variable, WeatherRecord, WeatherSeries};
use crate::weather_data::data_loader::{csv_to_dataframe, parse_value, string_column};
use crate::weather_data::error::WeatherDataError;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::info;
use std::path::Path;
use tokio::fs;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Reads a forecast cache file into a [`WeatherSeries`] localized to `timezone`.
///
/// Timestamps are stored as naive UTC. All values are taken as absolute values;
/// temperatures are converted from Kelvin, preferring `t_2m` and falling back to
/// `t_g` where the air temperature is missing. The series key is the file stem.
pub async fn read_cache_csv(path: &Path, timezone: Tz) -> Result<WeatherSeries, WeatherDataError> {
    let key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let source_name = path.display().to_string();

    let bytes = fs::read(path)
        .await
        .map_err(|e| WeatherDataError::CsvReadIo {
            source_name: source_name.clone(),
            source: e,
        })?;
    let df = csv_to_dataframe(bytes, b',', &source_name).await?;

    let times = string_column(&df, "time", &source_name)?;
    let diffuse = string_column(&df, "aswdifd_s", &source_name)?;
    let direct = string_column(&df, "aswdir_s", &source_name)?;
    let air_temp = string_column(&df, "t_2m", &source_name)?;
    let ground_temp = string_column(&df, "t_g", &source_name).ok();

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let Some(raw_time) = times.get(row).map(str::trim) else {
            continue;
        };
        let naive = NaiveDateTime::parse_from_str(raw_time, TIME_FORMAT).map_err(|_| {
            WeatherDataError::InvalidTimestamp {
                source_name: source_name.clone(),
                value: raw_time.to_string(),
                format: TIME_FORMAT.to_string(),
            }
        })?;
        let time = Utc.from_utc_datetime(&naive).with_timezone(&timezone);

        let value = |column: &str, cell: Option<&str>| {
            parse_value(cell, None, column, &source_name).map(|v| v.map(f64::abs))
        };
        let ground = match ground_temp {
            Some(column) => value("t_g", column.get(row))?,
            None => None,
        };
        let temperature = value("t_2m", air_temp.get(row))?
            .or(ground)
            .map(kelvin_to_celsius);

        records.push(WeatherRecord {
            time,
            global_horizontal: None,
            direct_horizontal: value("aswdir_s", direct.get(row))?,
            diffuse_horizontal: value("aswdifd_s", diffuse.get(row))?,
            temperature,
        });
    }
    info!("Read {} forecast rows from {}", records.len(), source_name);

    WeatherSeries::new(
        key,
        timezone,
        [
            Variable::DirectHorizontal,
            Variable::DiffuseHorizontal,
            Variable::Temperature,
        ],
        records,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FIXTURE: &str = "time,aswdifd_s,aswdir_s,t_2m,t_g
2024-06-01 10:00:00,120.5,300.0,300.0,301.0
2024-06-01 11:00:00,-130.0,-0.0,,290.0
2024-06-01 09:00:00,110.0,250.0,295.15,296.0
";

    #[test]
    fn test_kelvin_to_celsius() {
        assert!((kelvin_to_celsius(300.0) - 26.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_read_cache_csv() -> Result<(), WeatherDataError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DWD_2024060100.csv");
        fs::write(&path, FIXTURE).await.unwrap();

        let series = read_cache_csv(&path, chrono_tz::Europe::Berlin).await?;
        dbg!(&series);

        assert_eq!(series.key(), "DWD_2024060100");
        assert_eq!(series.len(), 3);
        assert!(!series.has(Variable::GlobalHorizontal));

        let first = &series.records()[0];
        // 09:00 UTC is 11:00 CEST
        assert_eq!(first.time.to_rfc3339(), "2024-06-01T11:00:00+02:00");
        assert!((first.temperature.unwrap() - 22.0).abs() < 1e-9);

        let second = &series.records()[1];
        assert!((second.temperature.unwrap() - 26.85).abs() < 1e-9);
        assert_eq!(second.diffuse_horizontal, Some(120.5));

        let third = &series.records()[2];
        assert_eq!(third.diffuse_horizontal, Some(130.0));
        assert_eq!(third.direct_horizontal, Some(0.0));
        // falls back to ground temperature
        assert!((third.temperature.unwrap() - 16.85).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DWD_2024060100.csv");
        fs::write(&path, "time,aswdir_s,t_2m\n2024-06-01 10:00:00,1,280\n")
            .await
            .unwrap();

        let result = read_cache_csv(&path, chrono_tz::UTC).await;
        assert!(matches!(
            result,
            Err(WeatherDataError::MissingColumnError { .. })
        ));
    }
}
