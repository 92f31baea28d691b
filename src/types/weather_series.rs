//! The canonical, timezone-aware weather container produced by every reader.

use crate::weather_data::error::WeatherDataError;
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A weather quantity a [`WeatherSeries`] can carry.
///
/// Irradiance variables are mean power densities in W/m², temperature is in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    GlobalHorizontal,
    DirectHorizontal,
    DiffuseHorizontal,
    Temperature,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::GlobalHorizontal,
        Variable::DirectHorizontal,
        Variable::DiffuseHorizontal,
        Variable::Temperature,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Variable::GlobalHorizontal => "global_horizontal",
            Variable::DirectHorizontal => "direct_horizontal",
            Variable::DiffuseHorizontal => "diffuse_horizontal",
            Variable::Temperature => "temperature",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One timestamped row of a [`WeatherSeries`]. `None` marks a missing sample.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub time: DateTime<Tz>,
    pub global_horizontal: Option<f64>,
    pub direct_horizontal: Option<f64>,
    pub diffuse_horizontal: Option<f64>,
    pub temperature: Option<f64>,
}

impl WeatherRecord {
    /// Creates a record with every variable missing.
    pub fn empty(time: DateTime<Tz>) -> Self {
        Self {
            time,
            global_horizontal: None,
            direct_horizontal: None,
            diffuse_horizontal: None,
            temperature: None,
        }
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::GlobalHorizontal => self.global_horizontal,
            Variable::DirectHorizontal => self.direct_horizontal,
            Variable::DiffuseHorizontal => self.diffuse_horizontal,
            Variable::Temperature => self.temperature,
        }
    }

    pub fn set(&mut self, variable: Variable, value: Option<f64>) {
        let slot = match variable {
            Variable::GlobalHorizontal => &mut self.global_horizontal,
            Variable::DirectHorizontal => &mut self.direct_horizontal,
            Variable::DiffuseHorizontal => &mut self.diffuse_horizontal,
            Variable::Temperature => &mut self.temperature,
        };
        *slot = value;
    }

    /// Builder-style variant of [`WeatherRecord::set`].
    pub fn with(mut self, variable: Variable, value: Option<f64>) -> Self {
        self.set(variable, value);
        self
    }
}

/// An ordered, de-duplicated sequence of [`WeatherRecord`]s with a source tag.
///
/// A series always carries at least one horizontal irradiance representation:
/// either `global_horizontal`, or both `direct_horizontal` and `diffuse_horizontal`.
/// The index is strictly increasing but not necessarily evenly spaced.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSeries {
    key: String,
    timezone: Tz,
    variables: Vec<Variable>,
    records: Vec<WeatherRecord>,
}

impl WeatherSeries {
    /// Creates a series from unordered records.
    ///
    /// Records are converted to `timezone`, sorted by instant, and for duplicate
    /// instants only the first occurrence is kept.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherDataError::NoIrradiance`] if `variables` holds neither
    /// `global_horizontal` nor the `direct_horizontal`/`diffuse_horizontal` pair.
    pub fn new(
        key: impl Into<String>,
        timezone: Tz,
        variables: impl IntoIterator<Item = Variable>,
        records: Vec<WeatherRecord>,
    ) -> Result<Self, WeatherDataError> {
        let key = key.into();
        let mut variables: Vec<Variable> = variables.into_iter().collect();
        variables.sort();
        variables.dedup();

        let has_global = variables.contains(&Variable::GlobalHorizontal);
        let has_components = variables.contains(&Variable::DirectHorizontal)
            && variables.contains(&Variable::DiffuseHorizontal);
        if !has_global && !has_components {
            return Err(WeatherDataError::NoIrradiance { key });
        }

        let mut records: Vec<WeatherRecord> = records
            .into_iter()
            .map(|mut record| {
                record.time = record.time.with_timezone(&timezone);
                record
            })
            .collect();
        records.sort_by_key(|record| record.time);
        records.dedup_by(|later, earlier| later.time == earlier.time);

        Ok(Self {
            key,
            timezone,
            variables,
            records,
        })
    }

    /// Opaque tag identifying the dataset this series came from.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn has(&self, variable: Variable) -> bool {
        self.variables.contains(&variable)
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Tz>> {
        self.records.first().map(|r| r.time)
    }

    pub fn end(&self) -> Option<DateTime<Tz>> {
        self.records.last().map(|r| r.time)
    }

    /// Returns the values of one variable in index order.
    pub fn values(&self, variable: Variable) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(variable)).collect()
    }

    /// Returns the records whose instant lies in `[start, end]`, both inclusive.
    ///
    /// Bounds may be given in any timezone; comparison is by instant.
    pub fn between<A: TimeZone, B: TimeZone>(&self, start: &DateTime<A>, end: &DateTime<B>) -> Self {
        let records = self
            .records
            .iter()
            .filter(|r| r.time >= *start && r.time <= *end)
            .cloned()
            .collect();
        Self {
            key: self.key.clone(),
            timezone: self.timezone,
            variables: self.variables.clone(),
            records,
        }
    }

    /// Exports the series to a polars `DataFrame`.
    ///
    /// The `time` column holds the local wall-clock time in the series' timezone;
    /// one `Float64` column follows per carried variable.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let times: Vec<_> = self.records.iter().map(|r| r.time.naive_local()).collect();
        let mut columns = vec![Column::new("time".into(), times)];
        for variable in &self.variables {
            columns.push(Column::new(
                variable.column_name().into(),
                self.values(*variable),
            ));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Berlin;

    fn record(hour: u32, ghi: f64) -> WeatherRecord {
        let time = Utc
            .with_ymd_and_hms(2024, 6, 1, hour, 0, 0)
            .unwrap()
            .with_timezone(&Berlin);
        WeatherRecord::empty(time)
            .with(Variable::GlobalHorizontal, Some(ghi))
            .with(Variable::DiffuseHorizontal, Some(ghi / 2.0))
    }

    #[test]
    fn test_sorts_and_deduplicates() -> Result<(), WeatherDataError> {
        let series = WeatherSeries::new(
            "test",
            Berlin,
            [Variable::GlobalHorizontal, Variable::DiffuseHorizontal],
            vec![record(12, 3.0), record(10, 1.0), record(11, 2.0), record(10, 9.0)],
        )?;

        assert_eq!(series.len(), 3);
        assert_eq!(
            series.values(Variable::GlobalHorizontal),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        assert!(series
            .records()
            .windows(2)
            .all(|pair| pair[0].time < pair[1].time));
        Ok(())
    }

    #[test]
    fn test_rejects_series_without_irradiance() {
        let result = WeatherSeries::new(
            "temps",
            Berlin,
            [Variable::Temperature, Variable::DiffuseHorizontal],
            vec![],
        );
        assert!(matches!(result, Err(WeatherDataError::NoIrradiance { .. })));
    }

    #[test]
    fn test_between_is_inclusive() -> Result<(), WeatherDataError> {
        let series = WeatherSeries::new(
            "test",
            Berlin,
            [Variable::GlobalHorizontal],
            (6..18).map(|h| record(h, h as f64)).collect(),
        )?;
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();

        let slice = series.between(&start, &end);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.key(), "test");
        Ok(())
    }

    #[test]
    fn test_to_dataframe() -> Result<(), Box<dyn std::error::Error>> {
        let series = WeatherSeries::new(
            "test",
            Berlin,
            [Variable::GlobalHorizontal, Variable::DiffuseHorizontal],
            vec![record(10, 1.0), record(11, 2.0)],
        )?;
        let df = series.to_dataframe()?;
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(
            df.get_column_names(),
            ["time", "global_horizontal", "diffuse_horizontal"]
        );
        Ok(())
    }
}
