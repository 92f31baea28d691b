//! Converts the latest complete GRIB2 forecast run into a normalized CSV cache file.
//!
//! Runs are laid out as `<data>/dwd/<field>/<horizon>_<YYYYMMDDHH>_<step>.grib2.bz2`.
//! The converted file lands in `<data>/csv/<KEY>_<YYYYMMDDHH>.csv` with the header
//! `time,aswdifd_s,aswdir_s,t_2m,t_g`.

use crate::grid::decoder::{GridCell, GridDecoder, GridMessage};
use crate::grid::error::GridForecastError;
use crate::grid::geo_distance::{distance_km, nearest_cell};
use crate::types::location::LatLon;
use async_compression::tokio::bufread::BzDecoder;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::{fs, task};

pub const DIFFUSE_FIELD: &str = "aswdifd_s";
pub const DIRECT_FIELD: &str = "aswdir_s";
pub const AIR_TEMPERATURE_FIELD: &str = "t_2m";
pub const GROUND_TEMPERATURE_FIELD: &str = "t_g";

const COMPRESSED_SUFFIX: &str = ".bz2";

/// Which runs and how much of them the [`GridForecastReader`] converts.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRunConfig {
    /// Fields to extract, in CSV column order.
    pub fields: Vec<String>,
    /// Fields holding a mean-since-run-start that must be de-accumulated.
    pub accumulated_fields: Vec<String>,
    /// Horizon marker of a full-length run.
    pub horizon: String,
    /// A field with fewer step files is skipped.
    pub min_steps: usize,
    /// Number of leading step files converted.
    pub max_steps: usize,
}

impl Default for GridRunConfig {
    fn default() -> Self {
        Self {
            fields: [
                DIFFUSE_FIELD,
                DIRECT_FIELD,
                AIR_TEMPERATURE_FIELD,
                GROUND_TEMPERATURE_FIELD,
            ]
            .map(String::from)
            .to_vec(),
            accumulated_fields: vec![DIFFUSE_FIELD.to_string(), DIRECT_FIELD.to_string()],
            horizon: "120".to_string(),
            min_steps: 48,
            max_steps: 24,
        }
    }
}

/// Result of a conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridRunOutcome {
    /// A new cache file was written.
    Produced(PathBuf),
    /// No full-horizon run exists, or the latest one was already converted.
    NoNewRun,
    /// A run exists but no field had enough step files.
    InsufficientSteps,
}

/// A compressed step file parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RunEntry {
    issue: String,
    step: u32,
    horizon: String,
    path: PathBuf,
}

impl RunEntry {
    fn parse(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(COMPRESSED_SUFFIX)?;
        let mut parts = stem.splitn(3, '_');
        let horizon = parts.next()?.to_string();
        let issue = parts.next()?;
        let step_part = parts.next()?;
        if issue.len() != 10 || !issue.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let step_digits: String = step_part.chars().take_while(char::is_ascii_digit).collect();
        let step = step_digits.parse().ok()?;
        Some(Self {
            issue: issue.to_string(),
            step,
            horizon,
            path,
        })
    }
}

pub struct GridForecastReader {
    data_dir: PathBuf,
    config: GridRunConfig,
    decoder: Arc<dyn GridDecoder>,
}

impl GridForecastReader {
    pub fn new(data_dir: &Path, decoder: Arc<dyn GridDecoder>) -> Self {
        Self::with_config(data_dir, decoder, GridRunConfig::default())
    }

    pub fn with_config(
        data_dir: &Path,
        decoder: Arc<dyn GridDecoder>,
        config: GridRunConfig,
    ) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            config,
            decoder,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("csv")
    }

    fn field_dir(&self, field: &str) -> PathBuf {
        self.data_dir.join("dwd").join(field)
    }

    /// Converts the latest complete run for `location` into `<KEY>_<issue>.csv`.
    ///
    /// Decompressed intermediates live in a temporary directory that is removed
    /// when this call returns, whatever the outcome.
    pub async fn convert_latest(
        &self,
        key: &str,
        location: LatLon,
    ) -> Result<GridRunOutcome, GridForecastError> {
        let mut entries = BTreeMap::new();
        for field in &self.config.fields {
            entries.insert(field.clone(), self.list_entries(field).await?);
        }

        let Some(issue) = self.latest_issue(&entries) else {
            info!("No {}h forecast run found", self.config.horizon);
            return Ok(GridRunOutcome::NoNewRun);
        };

        let cache_dir = self.cache_dir();
        let output = cache_dir.join(format!("{key}_{issue}.csv"));
        if fs::metadata(&output).await.is_ok() {
            info!("Forecast run {} already converted to {:?}", issue, output);
            return Ok(GridRunOutcome::NoNewRun);
        }
        info!("Converting forecast run {} for {:?}", issue, location);

        let scratch = TempDir::new().map_err(GridForecastError::TempDirCreation)?;
        let mut columns: BTreeMap<String, BTreeMap<DateTime<Utc>, f64>> = BTreeMap::new();

        for field in &self.config.fields {
            let mut run: Vec<RunEntry> = entries
                .remove(field)
                .unwrap_or_default()
                .into_iter()
                .filter(|e| e.issue == issue && e.horizon == self.config.horizon)
                .collect();
            run.sort();

            if run.len() < self.config.min_steps {
                warn!(
                    "Skipping field {} of run {}: {} step files, {} required",
                    field,
                    issue,
                    run.len(),
                    self.config.min_steps
                );
                continue;
            }
            run.truncate(self.config.max_steps);

            let field_scratch = scratch.path().join(field);
            fs::create_dir_all(&field_scratch)
                .await
                .map_err(|e| GridForecastError::DirectoryCreation(field_scratch.clone(), e))?;
            let mut files = Vec::with_capacity(run.len());
            for entry in &run {
                files.push(Self::decompress(&entry.path, &field_scratch).await?);
            }

            let decoder = Arc::clone(&self.decoder);
            let accumulated = self.config.accumulated_fields.contains(field);
            let field_name = field.clone();
            let series = task::spawn_blocking(move || {
                extract_field(decoder.as_ref(), &field_name, &files, location, accumulated)
            })
            .await??;
            debug!("Field {} yielded {} rows", field, series.len());
            columns.insert(field.clone(), series);
        }

        if columns.is_empty() {
            warn!("Forecast run {} has no field with enough steps", issue);
            return Ok(GridRunOutcome::InsufficientSteps);
        }

        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| GridForecastError::DirectoryCreation(cache_dir.clone(), e))?;
        let fields = self.config.fields.clone();
        let path = output.clone();
        task::spawn_blocking(move || write_cache_csv(&path, &fields, &columns)).await??;
        info!("Wrote forecast cache file {:?}", output);

        Ok(GridRunOutcome::Produced(output))
    }

    async fn list_entries(&self, field: &str) -> Result<Vec<RunEntry>, GridForecastError> {
        let dir = self.field_dir(field);
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Forecast directory {:?} does not exist", dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(GridForecastError::DirectoryRead(dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| GridForecastError::DirectoryRead(dir.clone(), e))?
        {
            if let Some(entry) = RunEntry::parse(dir_entry.path()) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Latest issue timestamp carried by any field with a full-horizon run.
    ///
    /// Fields lacking that run are left to the per-field step check.
    fn latest_issue(&self, entries: &BTreeMap<String, Vec<RunEntry>>) -> Option<String> {
        self.config
            .fields
            .iter()
            .filter_map(|field| entries.get(field))
            .flatten()
            .filter(|e| e.horizon == self.config.horizon)
            .map(|e| e.issue.clone())
            .max()
    }

    async fn decompress(source: &Path, target_dir: &Path) -> Result<PathBuf, GridForecastError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(COMPRESSED_SUFFIX))
            .unwrap_or("step.grib2");
        let target = target_dir.join(name);

        let file = fs::File::open(source)
            .await
            .map_err(|e| GridForecastError::Decompression(source.to_path_buf(), e))?;
        let mut decoder = BzDecoder::new(BufReader::new(file));
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(|e| GridForecastError::Decompression(source.to_path_buf(), e))?;

        let mut out = fs::File::create(&target)
            .await
            .map_err(|e| GridForecastError::Decompression(target.clone(), e))?;
        out.write_all(&decompressed)
            .await
            .map_err(|e| GridForecastError::Decompression(target.clone(), e))?;
        out.flush()
            .await
            .map_err(|e| GridForecastError::Decompression(target.clone(), e))?;
        Ok(target)
    }
}

/// Recovers the mean rate over `[prev, curr]` from two means-since-`start`.
pub fn deaccumulate(
    start: DateTime<Utc>,
    prev: (DateTime<Utc>, f64),
    curr: (DateTime<Utc>, f64),
) -> f64 {
    let hours = |from: DateTime<Utc>, to: DateTime<Utc>| (to - from).num_seconds() as f64 / 3600.0;
    let dt = hours(prev.0, curr.0);
    (1.0 / dt) * (hours(start, curr.0) * curr.1 - hours(start, prev.0) * prev.1)
}

/// Decodes a field's step files and walks consecutive pairs at the nearest cell.
///
/// Each row is labeled with the start of its interval.
fn extract_field(
    decoder: &dyn GridDecoder,
    field: &str,
    files: &[PathBuf],
    location: LatLon,
    accumulated: bool,
) -> Result<BTreeMap<DateTime<Utc>, f64>, GridForecastError> {
    let mut messages: Vec<(PathBuf, GridMessage)> = Vec::new();
    for file in files {
        for message in decoder.decode(file)? {
            messages.push((file.clone(), message));
        }
    }
    messages.sort_by_key(|(_, m)| m.valid_time);

    let mut rows = BTreeMap::new();
    let Some((_, first)) = messages.first() else {
        return Ok(rows);
    };

    let cell: GridCell = nearest_cell(&first.grid, location).ok_or_else(|| {
        GridForecastError::Decode {
            path: files.first().cloned().unwrap_or_default(),
            message: "grid has no cells".to_string(),
        }
    })?;
    if let Some(point) = first.grid.lat_lon(cell) {
        debug!(
            "Nearest {} cell {:?} at {:?}, {:.1} km from site",
            field,
            cell,
            point,
            distance_km(point, location)
        );
    }

    let start = first.valid_time;
    let mut previous: Option<(DateTime<Utc>, f64)> = None;
    for (path, message) in &messages {
        let value = message
            .value_at(cell)
            .ok_or_else(|| GridForecastError::MissingValue {
                path: path.clone(),
                field: field.to_string(),
            })?;
        let current = (message.valid_time, value);
        if let Some(prev) = previous {
            let row_value = if accumulated {
                deaccumulate(start, prev, current)
            } else {
                current.1
            };
            rows.insert(prev.0, row_value);
        }
        previous = Some(current);
    }
    Ok(rows)
}

fn write_cache_csv(
    path: &Path,
    fields: &[String],
    columns: &BTreeMap<String, BTreeMap<DateTime<Utc>, f64>>,
) -> Result<(), GridForecastError> {
    let times: BTreeSet<DateTime<Utc>> = columns.values().flat_map(|c| c.keys().copied()).collect();

    let mut frame_columns = vec![Column::new(
        "time".into(),
        times
            .iter()
            .map(|t| t.format("%Y-%m-%d %H:00:00").to_string())
            .collect::<Vec<_>>(),
    )];
    for field in fields {
        let values: Vec<Option<f64>> = times
            .iter()
            .map(|t| columns.get(field).and_then(|c| c.get(t)).copied())
            .collect();
        frame_columns.push(Column::new(field.as_str().into(), values));
    }
    let mut df = DataFrame::new(frame_columns)
        .map_err(|e| GridForecastError::CsvWritePolars(path.to_path_buf(), e))?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| GridForecastError::CsvWriteIo(path.to_path_buf(), e))?;
    CsvWriter::new(temp_file.as_file_mut())
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| GridForecastError::CsvWritePolars(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| GridForecastError::CsvWriteIo(path.to_path_buf(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::decoder::LatLonGrid;
    use async_compression::tokio::write::BzEncoder;
    use chrono::{Duration, TimeZone, Timelike};

    /// Reads the fixture format `<field> <rfc3339> <v00> <v01> <v10> <v11>` on a 2x2 grid.
    struct TextDecoder;

    impl GridDecoder for TextDecoder {
        fn decode(&self, path: &Path) -> Result<Vec<GridMessage>, GridForecastError> {
            let text = std::fs::read_to_string(path).map_err(|e| GridForecastError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let parts: Vec<&str> = text.split_whitespace().collect();
            let valid_time = DateTime::parse_from_rfc3339(parts[1])
                .map_err(|e| GridForecastError::Decode {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?
                .with_timezone(&Utc);
            let values = parts[2..].iter().map(|v| v.parse().unwrap()).collect();
            Ok(vec![GridMessage {
                short_name: parts[0].to_string(),
                valid_time,
                grid: LatLonGrid::new(2, 2, vec![48.0, 48.0, 49.0, 49.0], vec![9.0, 10.0, 9.0, 10.0]),
                values,
            }])
        }
    }

    fn issue_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    async fn write_step(
        dir: &Path,
        field: &str,
        horizon: &str,
        issue: DateTime<Utc>,
        step: u32,
        value: f64,
    ) {
        let time = issue + Duration::hours(step as i64);
        // Only the cell nearest to (48.1, 9.9), index 1, carries `value`.
        let body = format!("{field} {} -1 {value} -1 -1", time.to_rfc3339());
        let mut encoder = BzEncoder::new(Vec::new());
        encoder.write_all(body.as_bytes()).await.unwrap();
        encoder.shutdown().await.unwrap();
        let name = format!("{horizon}_{}_{step:03}.grib2.bz2", issue.format("%Y%m%d%H"));
        fs::write(dir.join(name), encoder.into_inner()).await.unwrap();
    }

    /// Writes a 120 h run. Temperatures are `280 + issue hour + step` so rows
    /// reveal which run they came from.
    async fn write_run(data: &Path, issue: DateTime<Utc>, fields: &[&str], steps: u32) {
        for field in fields {
            let dir = data.join("dwd").join(field);
            fs::create_dir_all(&dir).await.unwrap();
            for step in 0..steps {
                // mean-since-start of a constant 100 W/m² flux is 100 after the first step
                let value = if field.starts_with("aswd") {
                    if step == 0 { 0.0 } else { 100.0 }
                } else {
                    280.0 + issue.hour() as f64 + step as f64
                };
                write_step(&dir, field, "120", issue, step, value).await;
            }
        }
    }

    #[test]
    fn test_deaccumulate_recovers_interval_means() {
        let t0 = issue_time();
        let t1 = t0 + Duration::hours(1);
        let t2 = t0 + Duration::hours(2);
        // means since t0 of an hourly 3600 then 7200 flux
        assert_eq!(deaccumulate(t0, (t0, 0.0), (t1, 3600.0)), 3600.0);
        assert_eq!(deaccumulate(t0, (t1, 3600.0), (t2, 5400.0)), 7200.0);
    }

    #[test]
    fn test_run_entry_parsing() {
        let entry = RunEntry::parse(PathBuf::from("/x/120_2024060100_007.grib2.bz2")).unwrap();
        assert_eq!(entry.horizon, "120");
        assert_eq!(entry.issue, "2024060100");
        assert_eq!(entry.step, 7);
        assert!(RunEntry::parse(PathBuf::from("/x/120_2024060100_007.grib2")).is_none());
        assert!(RunEntry::parse(PathBuf::from("/x/readme.txt.bz2")).is_none());
    }

    #[tokio::test]
    async fn test_produces_cache_file() -> Result<(), GridForecastError> {
        let data = TempDir::new().unwrap();
        write_run(data.path(), issue_time(), &["aswdifd_s", "aswdir_s", "t_2m", "t_g"], 48).await;

        let reader = GridForecastReader::new(data.path(), Arc::new(TextDecoder));
        let outcome = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;

        let expected = data.path().join("csv").join("DWD_2024060100.csv");
        assert_eq!(outcome, GridRunOutcome::Produced(expected.clone()));

        let text = std::fs::read_to_string(&expected).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,aswdifd_s,aswdir_s,t_2m,t_g");
        // 24 steps give 23 intervals, labeled by their start
        assert_eq!(lines.len(), 24);
        assert!(lines[1].starts_with("2024-06-01 00:00:00,100.0,100.0,281.0,281.0"));
        assert!(lines[23].starts_with("2024-06-01 22:00:00,"));

        // Converting the same run again is a no-op.
        let again = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;
        assert_eq!(again, GridRunOutcome::NoNewRun);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_complete_run() -> Result<(), GridForecastError> {
        let data = TempDir::new().unwrap();
        let dir = data.path().join("dwd").join("aswdir_s");
        fs::create_dir_all(&dir).await.unwrap();
        write_step(&dir, "aswdir_s", "078", issue_time(), 0, 0.0).await;

        let reader = GridForecastReader::new(data.path(), Arc::new(TextDecoder));
        let outcome = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;
        assert_eq!(outcome, GridRunOutcome::NoNewRun);
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_steps() -> Result<(), GridForecastError> {
        let data = TempDir::new().unwrap();
        write_run(data.path(), issue_time(), &["aswdifd_s", "aswdir_s", "t_2m", "t_g"], 30).await;

        let reader = GridForecastReader::new(data.path(), Arc::new(TextDecoder));
        let outcome = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;
        assert_eq!(outcome, GridRunOutcome::InsufficientSteps);
        assert!(!data.path().join("csv").join("DWD_2024060100.csv").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_field_directory_only_drops_that_field() -> Result<(), GridForecastError> {
        let data = TempDir::new().unwrap();
        write_run(data.path(), issue_time(), &["aswdifd_s", "aswdir_s", "t_2m"], 48).await;

        let reader = GridForecastReader::new(data.path(), Arc::new(TextDecoder));
        let outcome = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;

        let expected = data.path().join("csv").join("DWD_2024060100.csv");
        assert_eq!(outcome, GridRunOutcome::Produced(expected.clone()));

        let text = std::fs::read_to_string(&expected).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        dbg!(&lines[..3]);
        assert_eq!(lines[0], "time,aswdifd_s,aswdir_s,t_2m,t_g");
        assert_eq!(lines.len(), 24);
        // t_g column stays empty
        assert!(lines[1..].iter().all(|l| l.ends_with(',')));
        assert!(lines[1].starts_with("2024-06-01 00:00:00,100.0,100.0,281.0,"));
        Ok(())
    }

    #[tokio::test]
    async fn test_converts_newest_full_horizon_run() -> Result<(), GridForecastError> {
        let data = TempDir::new().unwrap();
        let fields = ["aswdifd_s", "aswdir_s", "t_2m", "t_g"];
        let older = issue_time();
        let newer = issue_time() + Duration::hours(12);
        let shorter = issue_time() + Duration::hours(24);
        write_run(data.path(), older, &fields, 48).await;
        write_run(data.path(), newer, &fields, 48).await;
        for field in fields {
            let dir = data.path().join("dwd").join(field);
            for step in 0..48 {
                write_step(&dir, field, "078", shorter, step, 999.0).await;
            }
        }

        let reader = GridForecastReader::new(data.path(), Arc::new(TextDecoder));
        let outcome = reader.convert_latest("DWD", LatLon(48.1, 9.9)).await?;

        let expected = data.path().join("csv").join("DWD_2024060112.csv");
        assert_eq!(outcome, GridRunOutcome::Produced(expected.clone()));

        let text = std::fs::read_to_string(&expected).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 24);
        // temperatures encode the issue hour: 280 + 12 + step 1
        assert!(lines[1].starts_with("2024-06-01 12:00:00,100.0,100.0,293.0,293.0"));
        assert!(lines[23].starts_with("2024-06-02 10:00:00,"));
        assert!(!text.contains("999"));
        assert!(!data.path().join("csv").join("DWD_2024060100.csv").exists());
        Ok(())
    }
}
