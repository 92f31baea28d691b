use chrono::DateTime;
use chrono_tz::Tz;
use polars::prelude::*;

/// One hourly plane-of-array value, labeled with the start of its hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyValue {
    pub time: DateTime<Tz>,
    /// Mean plane-of-array irradiance over the hour in W/m².
    pub value: f64,
}

/// The hourly plane-of-array irradiance produced by the transposition engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyIrradiation {
    name: String,
    timezone: Tz,
    values: Vec<HourlyValue>,
}

impl HourlyIrradiation {
    pub const NAME: &'static str = "irradiation";

    pub(crate) fn new(timezone: Tz, values: Vec<HourlyValue>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            timezone,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn values(&self) -> &[HourlyValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HourlyValue> {
        self.values.iter()
    }

    /// Sum of the hourly means, i.e. the energy in Wh/m² over the series.
    pub fn total(&self) -> f64 {
        self.values.iter().map(|v| v.value).sum()
    }

    /// Exports to a two column `DataFrame`: local `time` and `irradiation`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let times: Vec<_> = self.values.iter().map(|v| v.time.naive_local()).collect();
        let values: Vec<f64> = self.values.iter().map(|v| v.value).collect();
        DataFrame::new(vec![
            Column::new("time".into(), times),
            Column::new(self.name.as_str().into(), values),
        ])
    }
}
